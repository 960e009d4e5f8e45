//! Concentric rings expanding from a point of the grid

use super::Effect;
use crate::color::{Rgb, dim};
use crate::frame::{Frame, Pixel};
use crate::palette;
use crate::pattern::PatternId;
use crate::rng::{PredictableRandom, RandomSource};

const MIN_PERIOD_MS: u32 = 1_500;

/// Rings whose center is drawn from the frame stream once per ring period.
#[derive(Debug, Clone)]
pub struct RingsEffect {
    palette: u8,
    period_ms: u32,
    /// Number of rings between the center and the farthest corner
    density: f32,
    center: (f32, f32),
    phase: f32,
}

impl RingsEffect {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(pattern: PatternId) -> Self {
        let variant = pattern.variant_bits();
        Self {
            palette: pattern.palette(),
            period_ms: MIN_PERIOD_MS + (variant & 0x7) * 250,
            density: 1.0 + ((variant >> 3) & 0x3) as f32,
            center: (0.5, 0.5),
            phase: 0.0,
        }
    }
}

impl Effect for RingsEffect {
    #[allow(clippy::cast_precision_loss)]
    fn begin(&mut self, frame: &Frame, rng: &mut PredictableRandom) {
        let time_ms = frame.time_ms();
        // The center only moves once per period, so it is drawn from the
        // period index rather than from the exact frame time.
        let period_index = time_ms / self.period_ms;
        rng.reset_with_frame(frame.pattern.raw(), period_index, "rings");
        self.center = (rng.random_unit_f32(), rng.random_unit_f32());
        self.phase = (time_ms % self.period_ms) as f32 / self.period_ms as f32;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn color(&self, frame: &Frame, pixel: &Pixel) -> Rgb {
        let (x, y) = frame.normalized(pixel.xy);
        let dx = x - self.center.0;
        let dy = y - self.center.1;
        let distance = libm::sqrtf(dx * dx + dy * dy);
        let wave = distance * self.density - self.phase;
        let fraction = wave - libm::floorf(wave);
        let brightness = (255.0 * (1.0 - fraction)) as u8;
        let hue = (distance * 255.0) as u8;
        dim(palette::sample(self.palette, hue), brightness)
    }
}
