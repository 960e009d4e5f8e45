//! Physical pixel layouts
//!
//! A layout is an ordered list of 2-D pixel positions in arbitrary units.
//! [`XYIndexStore`] turns any number of them into one shared, quantized grid.

mod xy_index;

pub use xy_index::{
    DEFAULT_EPSILON, DEFAULT_MAX_RESOLUTION, GridSize, LayoutError, LayoutId, XYIndex,
    XYIndexConfig, XYIndexStore,
};

/// Position of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle enclosing the rendered area.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub origin: Point,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const fn new(origin: Point, width: f32, height: f32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// Grow the rectangle so that it contains `point`
    #[must_use]
    pub fn including(self, point: Point) -> Self {
        let min_x = self.origin.x.min(point.x);
        let min_y = self.origin.y.min(point.y);
        let max_x = (self.origin.x + self.width).max(point.x);
        let max_y = (self.origin.y + self.height).max(point.y);
        Self::new(Point::new(min_x, min_y), max_x - min_x, max_y - min_y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.width / 2.0,
            self.origin.y + self.height / 2.0,
        )
    }
}

/// Source of pixel positions for one device's LED hardware.
pub trait Layout {
    fn pixel_count(&self) -> usize;

    /// Position of pixel `index`; only called with `index < pixel_count()`
    fn at(&self, index: usize) -> Point;
}

impl Layout for [Point] {
    fn pixel_count(&self) -> usize {
        self.len()
    }

    fn at(&self, index: usize) -> Point {
        self[index]
    }
}

impl<const N: usize> Layout for [Point; N] {
    fn pixel_count(&self) -> usize {
        N
    }

    fn at(&self, index: usize) -> Point {
        self[index]
    }
}

/// Rectangular panel of `width` x `height` pixels at unit spacing.
#[derive(Debug, Clone, Copy)]
pub struct MatrixLayout {
    width: usize,
    height: usize,
    serpentine: bool,
}

impl MatrixLayout {
    /// Row-major panel, every row wired left to right
    pub const fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            serpentine: false,
        }
    }

    /// Panel wired in a snake pattern: odd rows run right to left
    pub const fn serpentine(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            serpentine: true,
        }
    }
}

impl Layout for MatrixLayout {
    fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[allow(clippy::cast_precision_loss)]
    fn at(&self, index: usize) -> Point {
        let row = index / self.width.max(1);
        let mut column = index % self.width.max(1);
        if self.serpentine && row % 2 == 1 {
            column = self.width - 1 - column;
        }
        Point::new(column as f32, row as f32)
    }
}

/// Straight strip of evenly spaced pixels.
#[derive(Debug, Clone, Copy)]
pub struct StripLayout {
    count: usize,
    start: Point,
    step: Point,
}

impl StripLayout {
    pub const fn new(count: usize, start: Point, step: Point) -> Self {
        Self { count, start, step }
    }

    /// Horizontal strip starting at the origin with unit spacing
    pub const fn horizontal(count: usize) -> Self {
        Self::new(count, Point::new(0.0, 0.0), Point::new(1.0, 0.0))
    }
}

impl Layout for StripLayout {
    fn pixel_count(&self) -> usize {
        self.count
    }

    #[allow(clippy::cast_precision_loss)]
    fn at(&self, index: usize) -> Point {
        let i = index as f32;
        Point::new(self.start.x + self.step.x * i, self.start.y + self.step.y * i)
    }
}
