//! Palettes addressed by the selector bits of a pattern id

use crate::color::{Rgb, blend_colors, rgb_from_u32};

/// Create a palette from a list of hex colors (0xRRGGBB format)
macro_rules! hex_palette {
    ($($color:expr),* $(,)?) => {
        &[
            $(rgb_from_u32($color)),*
        ]
    };
}

#[allow(clippy::unreadable_literal)]
const PALETTES: [&[Rgb]; 8] = [
    // Rainbow
    hex_palette![0xFF0000, 0xFFFF00, 0x00FF00, 0x00FFFF, 0x0000FF, 0xFF00FF, 0xFF0000],
    // Heat
    hex_palette![0x000000, 0x800000, 0xFF2000, 0xFF9000, 0xFFFF60],
    // Ocean
    hex_palette![0x000040, 0x0030A0, 0x0090C0, 0x00FFD4, 0x0030A0],
    // Forest
    hex_palette![0x003000, 0x006B20, 0x40A000, 0x90C030, 0x006B20],
    // Party
    hex_palette![0x5500AB, 0x84007C, 0xB5004B, 0xE5001B, 0xE81700, 0xAB7700, 0x5500AB],
    // Lava
    hex_palette![0x3C0014, 0xD10038, 0xFF5000, 0xFF972E, 0xF2039F],
    // Aurora
    hex_palette![0x002EB8, 0x00FFD4, 0x14FF78, 0x00C8FF, 0x8800FF, 0xFF0090],
    // Cloud
    hex_palette![0x0000FF, 0x87CEEB, 0xFFFFFF, 0x87CEEB, 0x0000FF],
];

/// Sample palette `selector` at position `t` (0-255), blending neighbours.
#[allow(clippy::cast_possible_truncation)]
pub fn sample(selector: u8, t: u8) -> Rgb {
    let palette = PALETTES[usize::from(selector) % PALETTES.len()];
    let segments = palette.len().saturating_sub(1);
    if segments == 0 {
        return palette.first().copied().unwrap_or_default();
    }

    let scaled = u16::from(t) * (segments as u16);
    let segment = usize::from(scaled >> 8).min(segments - 1);
    let local_t = (scaled & 0xFF) as u8;

    blend_colors(palette[segment], palette[segment + 1], local_t)
}
