//! Random sparkles that look the same on every device

use super::Effect;
use crate::color::{Rgb, dim};
use crate::frame::{Frame, Pixel};
use crate::palette;
use crate::pattern::PatternId;
use crate::rng::{PredictableRandom, RandomSource};

/// Sparkles are redrawn at this rate instead of every tick
const STEP_MS: u32 = 80;
const BACKGROUND_SCALE: u8 = 24;

/// Lights a random subset of grid cells in palette colors.
///
/// Each cell draws from its own sub-stream keyed by its grid position, so
/// the result does not depend on which pixels a device has or the order in
/// which they are rendered.
#[derive(Debug, Clone)]
pub struct GlitterEffect {
    palette: u8,
    /// Chance (out of 256) that a cell is lit
    density: u8,
    stream: PredictableRandom,
    background: Rgb,
}

impl GlitterEffect {
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(pattern: PatternId) -> Self {
        let variant = pattern.variant_bits();
        Self {
            palette: pattern.palette(),
            density: 16 + ((variant & 0x3F) as u8),
            stream: PredictableRandom::new(),
            background: Rgb::default(),
        }
    }

    pub const fn density(&self) -> u8 {
        self.density
    }
}

impl Effect for GlitterEffect {
    fn begin(&mut self, frame: &Frame, rng: &mut PredictableRandom) {
        let step = frame.time_ms() / STEP_MS;
        rng.reset_with_frame(frame.pattern.raw(), step, "glitter");
        self.background = dim(palette::sample(self.palette, rng.random_u8()), BACKGROUND_SCALE);
        self.stream = rng.clone();
    }

    fn color(&self, _frame: &Frame, pixel: &Pixel) -> Rgb {
        let cell = (u32::from(pixel.xy.x) << 16) | u32::from(pixel.xy.y);
        let mut cell_stream = self.stream.fork(cell);
        if cell_stream.random_u8() >= self.density {
            return self.background;
        }
        palette::sample(self.palette, cell_stream.random_u8())
    }
}
