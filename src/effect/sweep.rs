//! Sine bands sweeping across the grid

use core::f32::consts::TAU;

use super::Effect;
use crate::color::{Rgb, dim};
use crate::frame::{Frame, Pixel};
use crate::palette;
use crate::pattern::PatternId;
use crate::rng::PredictableRandom;

const BASE_PERIOD_MS: u32 = 2_000;

#[derive(Debug, Clone)]
pub struct SweepEffect {
    palette: u8,
    /// Number of bands across the grid
    bands: f32,
    period_ms: u32,
    vertical: bool,
    phase: f32,
}

impl SweepEffect {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(pattern: PatternId) -> Self {
        let variant = pattern.variant_bits();
        Self {
            palette: pattern.palette(),
            bands: 1.0 + (variant & 0x3) as f32,
            period_ms: BASE_PERIOD_MS + ((variant >> 2) & 0x7) * 500,
            vertical: variant & 0x20 != 0,
            phase: 0.0,
        }
    }
}

impl Effect for SweepEffect {
    #[allow(clippy::cast_precision_loss)]
    fn begin(&mut self, frame: &Frame, _rng: &mut PredictableRandom) {
        self.phase = (frame.time_ms() % self.period_ms) as f32 / self.period_ms as f32;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn color(&self, frame: &Frame, pixel: &Pixel) -> Rgb {
        let (x, y) = frame.normalized(pixel.xy);
        let (along, across) = if self.vertical { (y, x) } else { (x, y) };
        let wave = libm::sinf(TAU * (along * self.bands - self.phase));
        let brightness = ((wave + 1.0) * 127.5) as u8;
        dim(palette::sample(self.palette, (across * 255.0) as u8), brightness)
    }
}
