//! Effect system with compile-time known effect variants
//!
//! All effects are stored in an enum to avoid heap allocations. The enum is
//! sized by its largest variant, which bounds the per-frame context any
//! effect may keep. Each effect implements the `Effect` trait.

mod glitter;
mod rainbow;
mod rings;
mod solid;
mod sweep;

pub use glitter::GlitterEffect;
pub use rainbow::RainbowEffect;
pub use rings::RingsEffect;
pub use solid::{CalibrationEffect, SolidEffect};
pub use sweep::SweepEffect;

use crate::color::{BLACK, Rgb};
use crate::frame::{Frame, Pixel};
use crate::pattern::{EffectKind, PatternId};
use crate::rng::PredictableRandom;

pub trait Effect {
    /// Prepare per-frame state.
    ///
    /// `rng` was just reseeded from the frame, so anything drawn here is
    /// identical on every device playing the same frame.
    fn begin(&mut self, _frame: &Frame, _rng: &mut PredictableRandom) {}

    /// Color of one pixel for the frame passed to `begin`
    fn color(&self, frame: &Frame, pixel: &Pixel) -> Rgb;
}

/// Effect slot - enum containing all possible effects
#[derive(Debug, Clone, Default)]
pub enum EffectSlot {
    /// All pixels off
    #[default]
    Black,
    /// Whole layout in one palette color
    Solid(SolidEffect),
    /// Grid debug view
    Calibration(CalibrationEffect),
    Rainbow(RainbowEffect),
    Rings(RingsEffect),
    Glitter(GlitterEffect),
    Sweep(SweepEffect),
}

impl EffectSlot {
    /// Build the effect selected by `pattern`
    pub fn for_pattern(pattern: PatternId) -> Self {
        match pattern.effect() {
            EffectKind::Black => Self::Black,
            EffectKind::Solid => Self::Solid(SolidEffect::new(pattern)),
            EffectKind::Calibration => Self::Calibration(CalibrationEffect),
            EffectKind::Rainbow => Self::Rainbow(RainbowEffect::new(pattern)),
            EffectKind::Rings => Self::Rings(RingsEffect::new(pattern)),
            EffectKind::Glitter => Self::Glitter(GlitterEffect::new(pattern)),
            EffectKind::Sweep => Self::Sweep(SweepEffect::new(pattern)),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Black => EffectKind::Black,
            Self::Solid(_) => EffectKind::Solid,
            Self::Calibration(_) => EffectKind::Calibration,
            Self::Rainbow(_) => EffectKind::Rainbow,
            Self::Rings(_) => EffectKind::Rings,
            Self::Glitter(_) => EffectKind::Glitter,
            Self::Sweep(_) => EffectKind::Sweep,
        }
    }

    pub fn begin(&mut self, frame: &Frame, rng: &mut PredictableRandom) {
        match self {
            Self::Black => {}
            Self::Solid(effect) => effect.begin(frame, rng),
            Self::Calibration(effect) => effect.begin(frame, rng),
            Self::Rainbow(effect) => effect.begin(frame, rng),
            Self::Rings(effect) => effect.begin(frame, rng),
            Self::Glitter(effect) => effect.begin(frame, rng),
            Self::Sweep(effect) => effect.begin(frame, rng),
        }
    }

    pub fn color(&self, frame: &Frame, pixel: &Pixel) -> Rgb {
        match self {
            Self::Black => BLACK,
            Self::Solid(effect) => effect.color(frame, pixel),
            Self::Calibration(effect) => effect.color(frame, pixel),
            Self::Rainbow(effect) => effect.color(frame, pixel),
            Self::Rings(effect) => effect.color(frame, pixel),
            Self::Glitter(effect) => effect.color(frame, pixel),
            Self::Sweep(effect) => effect.color(frame, pixel),
        }
    }
}
