//! Per-tick rendering context

use embassy_time::Duration;

use crate::color::Rgb;
use crate::layout::{GridSize, LayoutId, Point, Viewport, XYIndex};
use crate::pattern::PatternId;

/// Everything an effect knows about the current tick.
///
/// Built fresh by the player on every render call. Two devices that agree
/// on `pattern` and `time` render the same image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Active pattern
    pub pattern: PatternId,
    /// Time since the pattern started
    pub time: Duration,
    /// Time since the last beat (equals `time` when no beat was seen)
    pub since_beat: Duration,
    /// Area covered by all layouts
    pub viewport: Viewport,
    /// Size of the normalized grid
    pub grid: GridSize,
}

impl Frame {
    /// Elapsed pattern time in milliseconds, saturating at `u32::MAX`
    pub fn time_ms(&self) -> u32 {
        u32::try_from(self.time.as_millis()).unwrap_or(u32::MAX)
    }

    /// Position of `xy` in `[0.0, 1.0]` on both axes
    #[allow(clippy::cast_precision_loss)]
    pub fn normalized(&self, xy: XYIndex) -> (f32, f32) {
        let scale = |index: u16, size: u16| {
            if size <= 1 {
                0.5
            } else {
                f32::from(index) / f32::from(size - 1)
            }
        };
        (scale(xy.x, self.grid.width), scale(xy.y, self.grid.height))
    }
}

/// One physical pixel as seen by effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub layout: LayoutId,
    pub index: usize,
    /// Physical position
    pub coord: Point,
    /// Normalized grid position
    pub xy: XYIndex,
}

/// Destination for rendered colors.
///
/// Implement this on top of the LED driver; the player calls it once per
/// pixel per frame.
pub trait PixelSink {
    fn set_pixel_color(&mut self, layout: LayoutId, index: usize, color: Rgb);

    /// Called after every pixel of a frame was set
    fn flush(&mut self) {}
}
