use core::fmt;

use heapless::Vec;

use super::{Layout, Point, Viewport};
use crate::frame::Pixel;

/// Default cap on distinct indices per axis
pub const DEFAULT_MAX_RESOLUTION: u16 = 100;

/// Coordinates closer than this are treated as the same value
pub const DEFAULT_EPSILON: f32 = 1e-7;

/// Configuration for grid normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XYIndexConfig {
    /// Maximum number of indices per axis
    pub max_resolution: u16,
    /// Tolerance used when merging nearly equal coordinates
    pub epsilon: f32,
}

impl Default for XYIndexConfig {
    fn default() -> Self {
        Self {
            max_resolution: DEFAULT_MAX_RESOLUTION,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Handle of an ingested layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayoutId(u8);

impl LayoutId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Quantized position of a pixel in the shared grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct XYIndex {
    pub x: u16,
    pub y: u16,
}

impl XYIndex {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Number of distinct indices on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridSize {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// The layout table is full
    TooManyLayouts,
    /// The pixel storage cannot hold the layout
    TooManyPixels,
    /// `finalize` was already called
    AlreadyFinalized,
    /// Lookup before `finalize`
    NotFinalized,
    /// The layout id does not belong to this store
    UnknownLayout,
    /// The pixel index is past the end of its layout
    PixelOutOfRange,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyLayouts => f.write_str("layout table is full"),
            Self::TooManyPixels => f.write_str("pixel storage is full"),
            Self::AlreadyFinalized => f.write_str("layouts were already finalized"),
            Self::NotFinalized => f.write_str("layouts are not finalized yet"),
            Self::UnknownLayout => f.write_str("unknown layout id"),
            Self::PixelOutOfRange => f.write_str("pixel index out of range"),
        }
    }
}

impl core::error::Error for LayoutError {}

#[derive(Debug, Clone, Copy)]
struct LayoutSpan {
    offset: usize,
    count: usize,
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    const fn of(self, point: Point) -> f32 {
        match self {
            Self::X => point.x,
            Self::Y => point.y,
        }
    }
}

/// Shared grid over every ingested layout.
///
/// Layouts are ingested once at startup, then [`XYIndexStore::finalize`]
/// computes every pixel's [`XYIndex`]. After that the store is read-only and
/// lookups are O(1).
#[derive(Debug)]
pub struct XYIndexStore<const MAX_LAYOUTS: usize, const MAX_PIXELS: usize> {
    config: XYIndexConfig,
    layouts: Vec<LayoutSpan, MAX_LAYOUTS>,
    points: Vec<Point, MAX_PIXELS>,
    indices: Vec<XYIndex, MAX_PIXELS>,
    bounds: Option<Viewport>,
    grid: GridSize,
    finalized: bool,
}

impl<const MAX_LAYOUTS: usize, const MAX_PIXELS: usize> Default
    for XYIndexStore<MAX_LAYOUTS, MAX_PIXELS>
{
    fn default() -> Self {
        Self::new(XYIndexConfig::default())
    }
}

impl<const MAX_LAYOUTS: usize, const MAX_PIXELS: usize> XYIndexStore<MAX_LAYOUTS, MAX_PIXELS> {
    pub const fn new(config: XYIndexConfig) -> Self {
        Self {
            config,
            layouts: Vec::new(),
            points: Vec::new(),
            indices: Vec::new(),
            bounds: None,
            grid: GridSize {
                width: 0,
                height: 0,
            },
            finalized: false,
        }
    }

    /// Register a layout and copy its pixel positions.
    pub fn ingest_layout<L: Layout + ?Sized>(&mut self, layout: &L) -> Result<LayoutId, LayoutError> {
        if self.finalized {
            return Err(LayoutError::AlreadyFinalized);
        }
        if self.layouts.is_full() || self.layouts.len() > usize::from(u8::MAX) {
            return Err(LayoutError::TooManyLayouts);
        }
        let count = layout.pixel_count();
        if MAX_PIXELS - self.points.len() < count {
            return Err(LayoutError::TooManyPixels);
        }

        let offset = self.points.len();
        for index in 0..count {
            let point = layout.at(index);
            self.bounds = Some(match self.bounds {
                Some(bounds) => bounds.including(point),
                None => Viewport::new(point, 0.0, 0.0),
            });
            // Capacity was checked above.
            let _ = self.points.push(point);
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = LayoutId(self.layouts.len() as u8);
        let _ = self.layouts.push(LayoutSpan { offset, count });
        Ok(id)
    }

    /// Bounding box of every ingested pixel
    pub fn viewport(&self) -> Viewport {
        self.bounds.unwrap_or_default()
    }

    /// Compute the grid index of every pixel.
    ///
    /// Each axis keeps exact per-value indices while its distinct value
    /// count fits the resolution cap, and falls back to proportional
    /// bucketing across `viewport` otherwise.
    pub fn finalize(&mut self, viewport: Viewport) -> Result<(), LayoutError> {
        if self.finalized {
            return Err(LayoutError::AlreadyFinalized);
        }

        self.indices.clear();
        for _ in 0..self.points.len() {
            let _ = self.indices.push(XYIndex::default());
        }

        let width = self.quantize_axis(Axis::X, viewport.origin.x, viewport.width);
        let height = self.quantize_axis(Axis::Y, viewport.origin.y, viewport.height);
        self.grid = GridSize { width, height };
        self.finalized = true;

        info!(
            "finalized {} layouts, {} pixels into a {}x{} grid",
            self.layouts.len(),
            self.points.len(),
            width,
            height
        );
        Ok(())
    }

    /// Assign one axis of every pixel's index, returning the axis size
    fn quantize_axis(&mut self, axis: Axis, origin: f32, size: f32) -> u16 {
        let mut distinct: Vec<f32, MAX_PIXELS> = self.points.iter().map(|p| axis.of(*p)).collect();
        distinct.sort_unstable_by(f32::total_cmp);

        let epsilon = self.config.epsilon;
        let mut kept = 0;
        for i in 0..distinct.len() {
            if kept == 0 || distinct[i] - distinct[kept - 1] > epsilon {
                distinct[kept] = distinct[i];
                kept += 1;
            }
        }
        distinct.truncate(kept);

        let cap = self.config.max_resolution.max(1);
        if distinct.len() > usize::from(cap) {
            for (point, index) in self.points.iter().zip(self.indices.iter_mut()) {
                let bucket = bucket_index(axis.of(*point), origin, size, cap);
                set_axis(index, axis, bucket);
            }
            cap
        } else {
            for (point, index) in self.points.iter().zip(self.indices.iter_mut()) {
                let value = axis.of(*point);
                let position = distinct.partition_point(|&d| d < value - epsilon);
                #[allow(clippy::cast_possible_truncation)]
                set_axis(index, axis, position as u16);
            }
            #[allow(clippy::cast_possible_truncation)]
            let count = distinct.len() as u16;
            count
        }
    }

    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Size of the normalized grid (zero before `finalize`)
    pub const fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    /// Ids and pixel counts of all ingested layouts
    #[allow(clippy::cast_possible_truncation)]
    pub fn layouts(&self) -> impl Iterator<Item = (LayoutId, usize)> + '_ {
        self.layouts
            .iter()
            .enumerate()
            .map(|(i, span)| (LayoutId(i as u8), span.count))
    }

    pub fn pixel_count(&self, layout: LayoutId) -> Result<usize, LayoutError> {
        self.span(layout).map(|span| span.count)
    }

    fn span(&self, layout: LayoutId) -> Result<LayoutSpan, LayoutError> {
        self.layouts
            .get(layout.index())
            .copied()
            .ok_or(LayoutError::UnknownLayout)
    }

    /// Precomputed grid index of a pixel.
    ///
    /// Returns `None` before `finalize` or for an out-of-range pixel.
    pub fn from_pixel(&self, layout: LayoutId, index: usize) -> Option<XYIndex> {
        let span = self.span(layout).ok()?;
        if index >= span.count {
            return None;
        }
        self.indices.get(span.offset + index).copied()
    }

    /// Everything effects need to know about one pixel
    pub fn pixel(&self, layout: LayoutId, index: usize) -> Result<Pixel, LayoutError> {
        if !self.finalized {
            return Err(LayoutError::NotFinalized);
        }
        let span = self.span(layout)?;
        if index >= span.count {
            return Err(LayoutError::PixelOutOfRange);
        }
        let slot = span.offset + index;
        Ok(Pixel {
            layout,
            index,
            coord: self.points[slot],
            xy: self.indices[slot],
        })
    }
}

fn set_axis(index: &mut XYIndex, axis: Axis, value: u16) {
    match axis {
        Axis::X => index.x = value,
        Axis::Y => index.y = value,
    }
}

/// Proportional bucket of `value` within `[origin, origin + size]`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bucket_index(value: f32, origin: f32, size: f32, cap: u16) -> u16 {
    if size <= 0.0 {
        return 0;
    }
    let scaled = libm::floorf((value - origin) * f32::from(cap) / size);
    // Float to int casts saturate, so negatives land on 0.
    (scaled as u32).min(u32::from(cap) - 1) as u16
}
