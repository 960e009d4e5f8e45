mod tests {
    use myrtio_light_sync::layout::{
        GridSize, LayoutError, MatrixLayout, Point, StripLayout, XYIndex, XYIndexConfig,
        XYIndexStore,
    };

    type Store = XYIndexStore<4, 512>;

    fn finalized(store: &mut Store) {
        let viewport = store.viewport();
        store.finalize(viewport).unwrap();
    }

    #[test]
    fn test_exact_indices_for_small_layout() {
        let mut store = Store::default();
        let strip = store.ingest_layout(&StripLayout::horizontal(10)).unwrap();
        finalized(&mut store);

        assert_eq!(store.grid(), GridSize { width: 10, height: 1 });
        for i in 0..10 {
            assert_eq!(store.from_pixel(strip, i), Some(XYIndex::new(i as u16, 0)));
        }
    }

    #[test]
    fn test_exact_indices_ignore_spacing() {
        // Uneven spacing still maps to consecutive indices.
        let points = [
            Point::new(0.0, 0.0),
            Point::new(0.5, 0.0),
            Point::new(7.0, 0.0),
            Point::new(100.0, 0.0),
        ];
        let mut store = Store::default();
        let layout = store.ingest_layout(&points).unwrap();
        finalized(&mut store);

        let xs: Vec<u16> = (0..4).map(|i| store.from_pixel(layout, i).unwrap().x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_exactly_at_cap_stays_exact() {
        let mut store = Store::default();
        let strip = store.ingest_layout(&StripLayout::horizontal(100)).unwrap();
        finalized(&mut store);

        assert_eq!(store.grid().width, 100);
        assert_eq!(store.from_pixel(strip, 99).unwrap().x, 99);
    }

    #[test]
    fn test_large_layout_is_bucketed() {
        let mut store = Store::default();
        let strip = store.ingest_layout(&StripLayout::horizontal(450)).unwrap();
        finalized(&mut store);

        assert_eq!(store.grid().width, 100);
        let mut previous = 0;
        for i in 0..450 {
            let x = store.from_pixel(strip, i).unwrap().x;
            assert!(x <= 99, "pixel {i} at {x}");
            assert!(x >= previous, "pixel {i} went back from {previous} to {x}");
            previous = x;
        }
        assert_eq!(store.from_pixel(strip, 0).unwrap().x, 0);
        assert_eq!(store.from_pixel(strip, 449).unwrap().x, 99);
    }

    #[test]
    fn test_bucketing_is_per_axis() {
        let mut store = Store::default();
        let strip = store
            .ingest_layout(&StripLayout::new(
                200,
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
            ))
            .unwrap();
        let column = store
            .ingest_layout(&StripLayout::new(
                3,
                Point::new(0.0, 0.0),
                Point::new(0.0, 5.0),
            ))
            .unwrap();
        finalized(&mut store);

        assert_eq!(store.grid(), GridSize { width: 100, height: 3 });
        assert_eq!(store.from_pixel(column, 2), Some(XYIndex::new(0, 2)));
        assert_eq!(store.from_pixel(strip, 199).unwrap().y, 0);
    }

    #[test]
    fn test_custom_resolution_cap() {
        let mut store = Store::new(XYIndexConfig {
            max_resolution: 8,
            ..XYIndexConfig::default()
        });
        let strip = store.ingest_layout(&StripLayout::horizontal(64)).unwrap();
        finalized(&mut store);

        assert_eq!(store.grid().width, 8);
        assert_eq!(store.from_pixel(strip, 0).unwrap().x, 0);
        assert_eq!(store.from_pixel(strip, 63).unwrap().x, 7);
    }

    #[test]
    fn test_nearly_equal_coordinates_merge() {
        let points = [
            Point::new(1.0, 0.0),
            Point::new(1.0004, 0.0),
            Point::new(2.0, 0.0),
        ];
        let mut store = Store::new(XYIndexConfig {
            epsilon: 1e-3,
            ..XYIndexConfig::default()
        });
        let layout = store.ingest_layout(&points).unwrap();
        finalized(&mut store);

        assert_eq!(store.grid().width, 2);
        assert_eq!(store.from_pixel(layout, 0), store.from_pixel(layout, 1));
        assert_eq!(store.from_pixel(layout, 2).unwrap().x, 1);
    }

    #[test]
    fn test_multiple_layouts_share_grid() {
        let mut store = Store::default();
        let matrix = store.ingest_layout(&MatrixLayout::serpentine(4, 3)).unwrap();
        let strip = store
            .ingest_layout(&StripLayout::new(
                4,
                Point::new(0.0, 3.0),
                Point::new(1.0, 0.0),
            ))
            .unwrap();
        finalized(&mut store);

        assert_eq!(store.layout_count(), 2);
        assert_eq!(store.grid(), GridSize { width: 4, height: 4 });
        // Second row of a serpentine panel runs right to left.
        assert_eq!(store.from_pixel(matrix, 4), Some(XYIndex::new(3, 1)));
        assert_eq!(store.from_pixel(strip, 0), Some(XYIndex::new(0, 3)));
        assert_eq!(store.pixel_count(strip), Ok(4));

        let layouts: Vec<_> = store.layouts().collect();
        assert_eq!(layouts, vec![(matrix, 12), (strip, 4)]);
    }

    #[test]
    fn test_pixel_carries_coordinates() {
        let mut store = Store::default();
        let matrix = store.ingest_layout(&MatrixLayout::new(3, 2)).unwrap();
        finalized(&mut store);

        let pixel = store.pixel(matrix, 5).unwrap();
        assert_eq!(pixel.layout, matrix);
        assert_eq!(pixel.index, 5);
        assert_eq!(pixel.coord, Point::new(2.0, 1.0));
        assert_eq!(pixel.xy, XYIndex::new(2, 1));
    }

    #[test]
    fn test_finalize_twice_fails() {
        let mut store = Store::default();
        store.ingest_layout(&StripLayout::horizontal(3)).unwrap();
        finalized(&mut store);

        let viewport = store.viewport();
        assert_eq!(store.finalize(viewport), Err(LayoutError::AlreadyFinalized));
        assert_eq!(
            store.ingest_layout(&StripLayout::horizontal(3)),
            Err(LayoutError::AlreadyFinalized)
        );
    }

    #[test]
    fn test_lookup_before_finalize() {
        let mut store = Store::default();
        let strip = store.ingest_layout(&StripLayout::horizontal(3)).unwrap();
        assert_eq!(store.from_pixel(strip, 0), None);
        assert_eq!(store.pixel(strip, 0), Err(LayoutError::NotFinalized));
    }

    #[test]
    fn test_capacity_errors() {
        let mut store = XYIndexStore::<1, 8>::default();
        assert_eq!(
            store.ingest_layout(&StripLayout::horizontal(9)),
            Err(LayoutError::TooManyPixels)
        );
        store.ingest_layout(&StripLayout::horizontal(8)).unwrap();
        assert_eq!(
            store.ingest_layout(&StripLayout::horizontal(1)),
            Err(LayoutError::TooManyLayouts)
        );
    }

    #[test]
    fn test_out_of_range_pixel() {
        let mut store = Store::default();
        let strip = store.ingest_layout(&StripLayout::horizontal(3)).unwrap();
        finalized(&mut store);
        assert_eq!(store.from_pixel(strip, 3), None);
        assert_eq!(store.pixel(strip, 3), Err(LayoutError::PixelOutOfRange));
        assert!(store.pixel(strip, 2).is_ok());
    }
}
