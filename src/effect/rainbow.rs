//! Palette rainbow flowing across the grid

use super::Effect;
use crate::color::Rgb;
use crate::frame::{Frame, Pixel};
use crate::palette;
use crate::pattern::PatternId;
use crate::rng::PredictableRandom;

const DEFAULT_CYCLE_MS: u32 = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainbowDirection {
    /// Flows along the x axis
    Horizontal,
    /// Flows along the y axis
    Vertical,
    /// Flows along the diagonal
    Diagonal,
    /// Mirrored around the vertical center line
    Mirrored,
}

/// Palette gradient that scrolls over time.
///
/// Direction and spatial stretch come from the pattern's variant bits.
#[derive(Debug, Clone)]
pub struct RainbowEffect {
    palette: u8,
    direction: RainbowDirection,
    /// How many palette cycles fit on the grid (1-4)
    stretch: u8,
    cycle_ms: u32,
    /// Palette offset of the current frame
    base: u8,
}

impl RainbowEffect {
    pub fn new(pattern: PatternId) -> Self {
        let variant = pattern.variant_bits();
        let direction = match variant & 0b11 {
            0 => RainbowDirection::Horizontal,
            1 => RainbowDirection::Vertical,
            2 => RainbowDirection::Diagonal,
            _ => RainbowDirection::Mirrored,
        };
        #[allow(clippy::cast_possible_truncation)]
        let stretch = ((variant >> 2) & 0b11) as u8 + 1;
        Self {
            palette: pattern.palette(),
            direction,
            stretch,
            cycle_ms: DEFAULT_CYCLE_MS,
            base: 0,
        }
    }

    pub const fn direction(&self) -> RainbowDirection {
        self.direction
    }
}

impl Effect for RainbowEffect {
    #[allow(clippy::cast_possible_truncation)]
    fn begin(&mut self, frame: &Frame, _rng: &mut PredictableRandom) {
        let cycle_ms = self.cycle_ms.max(1);
        let progress_ms = frame.time_ms() % cycle_ms;
        self.base = ((u64::from(progress_ms) * 255) / u64::from(cycle_ms)) as u8;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn color(&self, frame: &Frame, pixel: &Pixel) -> Rgb {
        let (x, y) = frame.normalized(pixel.xy);
        let position = match self.direction {
            RainbowDirection::Horizontal => x,
            RainbowDirection::Vertical => y,
            RainbowDirection::Diagonal => (x + y) / 2.0,
            RainbowDirection::Mirrored => 1.0 - libm::fabsf(2.0 * x - 1.0),
        };
        let offset = (position * 255.0 * f32::from(self.stretch)) as u32 as u8;
        palette::sample(self.palette, self.base.wrapping_add(offset))
    }
}
