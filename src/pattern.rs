//! Compact pattern identifiers
//!
//! A [`PatternId`] is the whole visual state a device needs to agree on: the
//! effect family, the palette and a handful of variant bits. Layout of the
//! 32 bits, least significant first:
//!
//! | bits      | meaning                                        |
//! |-----------|------------------------------------------------|
//! | `[0:4)`   | reserved marker, zero means "reserved pattern" |
//! | `[4:13)`  | variant bits                                   |
//! | `[13:16)` | palette selector                               |
//! | `[16:30)` | variant bits                                   |
//! | `[30:32)` | effect family                                  |
//!
//! Reserved ids (low nibble zero) name system patterns such as black or the
//! calibration grid and keep their meaning across randomization.

use core::fmt;

use crate::rng::RandomSource;

const RESERVED_MARKER_MASK: u32 = 0x0000_000F;
const PALETTE_SHIFT: u32 = 13;
const PALETTE_MASK: u32 = 0x0000_E000;
const FAMILY_SHIFT: u32 = 30;
/// Bits that survive randomization of a non-reserved id
const PRESERVED_MASK: u32 = 0xC000_E000;
/// Variant bits redrawn for a non-reserved id
const VARIANT_MASK: u32 = 0x3FFF_1FF0;

/// Low byte of a reserved id whose palette may still be randomized
pub const RESERVED_WITH_PALETTE: u8 = 0x10;
const RESERVED_CALIBRATION: u8 = 0x20;

/// Number of palettes addressable by the selector bits
pub const PALETTE_COUNT: u8 = 8;

/// Opaque 32-bit pattern identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PatternId(u32);

impl PatternId {
    /// All pixels off; also the "no pattern" state.
    pub const BLACK: Self = Self(0);
    /// Debug pattern showing the normalized grid.
    pub const CALIBRATION: Self = Self(RESERVED_CALIBRATION as u32);
    /// Solid palette color; only the palette is randomized.
    pub const SOLID: Self = Self(RESERVED_WITH_PALETTE as u32);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Build a non-reserved id for `family` and `palette`.
    ///
    /// The reserved marker is set to 1 so the id is randomizable.
    pub const fn new(family: EffectFamily, palette: u8) -> Self {
        Self(
            ((family as u32) << FAMILY_SHIFT)
                | (((palette % PALETTE_COUNT) as u32) << PALETTE_SHIFT)
                | 1,
        )
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_reserved(self) -> bool {
        self.0 & RESERVED_MARKER_MASK == 0
    }

    #[allow(clippy::cast_possible_truncation)]
    pub const fn low_byte(self) -> u8 {
        self.0 as u8
    }

    #[allow(clippy::cast_possible_truncation)]
    pub const fn palette(self) -> u8 {
        ((self.0 & PALETTE_MASK) >> PALETTE_SHIFT) as u8
    }

    /// Variant bits packed into one value (bits `[4:13)` then `[16:30)`)
    pub const fn variant_bits(self) -> u32 {
        ((self.0 >> 4) & 0x1FF) | (((self.0 >> 16) & 0x3FFF) << 9)
    }

    #[must_use]
    pub const fn with_palette(self, palette: u8) -> Self {
        Self((self.0 & !PALETTE_MASK) | (((palette % PALETTE_COUNT) as u32) << PALETTE_SHIFT))
    }

    /// Effect this id selects
    pub const fn effect(self) -> EffectKind {
        if self.is_reserved() {
            return match self.low_byte() {
                RESERVED_WITH_PALETTE => EffectKind::Solid,
                RESERVED_CALIBRATION => EffectKind::Calibration,
                _ => EffectKind::Black,
            };
        }
        match EffectFamily::from_bits(self.0 >> FAMILY_SHIFT) {
            EffectFamily::Rainbow => EffectKind::Rainbow,
            EffectFamily::Rings => EffectKind::Rings,
            EffectFamily::Glitter => EffectKind::Glitter,
            EffectFamily::Sweep => EffectKind::Sweep,
        }
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Non-reserved effect families (top two bits of a [`PatternId`])
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EffectFamily {
    Rainbow = 0,
    Rings = 1,
    Glitter = 2,
    Sweep = 3,
}

impl EffectFamily {
    const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Self::Rainbow,
            1 => Self::Rings,
            2 => Self::Glitter,
            _ => Self::Sweep,
        }
    }
}

/// Every effect a pattern id can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    Black,
    Solid,
    Calibration,
    Rainbow,
    Rings,
    Glitter,
    Sweep,
}

impl EffectKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Solid => "solid",
            Self::Calibration => "calibration",
            Self::Rainbow => "rainbow",
            Self::Rings => "rings",
            Self::Glitter => "glitter",
            Self::Sweep => "sweep",
        }
    }
}

/// Redraw the free bits of `id`.
///
/// Non-reserved ids get new variant bits and a new nonzero marker; the
/// palette and family are kept. Reserved-with-palette ids only get a new
/// palette. Any other reserved id is returned as is.
pub fn randomize_pattern<R: RandomSource + ?Sized>(id: PatternId, rng: &mut R) -> PatternId {
    if id.is_reserved() {
        if id.low_byte() == RESERVED_WITH_PALETTE {
            #[allow(clippy::cast_possible_truncation)]
            let palette = rng.random_between(0, u32::from(PALETTE_COUNT) - 1) as u8;
            return id.with_palette(palette);
        }
        return id;
    }

    let marker = rng.random_between(1, RESERVED_MARKER_MASK);
    let variant = rng.random_u32() & VARIANT_MASK;
    let randomized = PatternId((id.0 & PRESERVED_MASK) | variant | marker);
    assert!(
        !randomized.is_reserved(),
        "randomized pattern {randomized} lost its marker"
    );
    randomized
}

/// Rotation of base patterns played while a device chooses on its own.
#[derive(Debug, Clone)]
pub struct PatternSchedule<'a> {
    patterns: &'a [PatternId],
    position: usize,
}

/// Default rotation: every family, spread over the palettes.
pub const DEFAULT_ROTATION: [PatternId; 8] = [
    PatternId::new(EffectFamily::Rainbow, 0),
    PatternId::new(EffectFamily::Rings, 1),
    PatternId::new(EffectFamily::Glitter, 2),
    PatternId::new(EffectFamily::Sweep, 3),
    PatternId::new(EffectFamily::Rainbow, 4),
    PatternId::new(EffectFamily::Rings, 5),
    PatternId::new(EffectFamily::Glitter, 6),
    PatternId::new(EffectFamily::Sweep, 7),
];

impl Default for PatternSchedule<'static> {
    fn default() -> Self {
        Self::new(&DEFAULT_ROTATION)
    }
}

impl<'a> PatternSchedule<'a> {
    /// Create a schedule over `patterns`.
    ///
    /// An empty slice plays black.
    pub const fn new(patterns: &'a [PatternId]) -> Self {
        Self {
            patterns,
            position: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.patterns.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn current_base(&self) -> PatternId {
        self.patterns
            .get(self.position)
            .copied()
            .unwrap_or(PatternId::BLACK)
    }

    /// Pick a random starting point and return its randomized pattern
    #[allow(clippy::cast_possible_truncation)]
    pub fn start<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> PatternId {
        if !self.is_empty() {
            let last = (self.patterns.len() - 1) as u32;
            self.position = rng.random_between(0, last) as usize;
        }
        randomize_pattern(self.current_base(), rng)
    }

    /// Step forward and return the randomized pattern
    pub fn next<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> PatternId {
        if !self.is_empty() {
            self.position = (self.position + 1) % self.patterns.len();
        }
        randomize_pattern(self.current_base(), rng)
    }

    /// Step backward and return the randomized pattern
    pub fn prev<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> PatternId {
        if !self.is_empty() {
            let len = self.patterns.len();
            self.position = (self.position + len - 1) % len;
        }
        randomize_pattern(self.current_base(), rng)
    }
}
