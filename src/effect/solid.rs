//! Solid palette color and the calibration grid

use super::Effect;
use crate::color::Rgb;
use crate::frame::{Frame, Pixel};
use crate::palette;
use crate::pattern::PatternId;
use crate::rng::PredictableRandom;

/// Milliseconds per palette step of the slow drift
const DRIFT_STEP_MS: u32 = 120;

/// Fills everything with one palette color that drifts slowly.
#[derive(Debug, Clone)]
pub struct SolidEffect {
    palette: u8,
    color: Rgb,
}

impl SolidEffect {
    pub fn new(pattern: PatternId) -> Self {
        Self {
            palette: pattern.palette(),
            color: Rgb::default(),
        }
    }
}

impl Effect for SolidEffect {
    #[allow(clippy::cast_possible_truncation)]
    fn begin(&mut self, frame: &Frame, _rng: &mut PredictableRandom) {
        let t = (frame.time_ms() / DRIFT_STEP_MS) as u8;
        self.color = palette::sample(self.palette, t);
    }

    fn color(&self, _frame: &Frame, _pixel: &Pixel) -> Rgb {
        self.color
    }
}

/// Shows the normalized grid: red grows along x, green along y.
///
/// Useful when bringing up a new layout.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationEffect;

impl Effect for CalibrationEffect {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn color(&self, frame: &Frame, pixel: &Pixel) -> Rgb {
        let (x, y) = frame.normalized(pixel.xy);
        let origin = pixel.xy.x == 0 && pixel.xy.y == 0;
        Rgb {
            r: (x * 255.0) as u8,
            g: (y * 255.0) as u8,
            b: if origin { 255 } else { 0 },
        }
    }
}
