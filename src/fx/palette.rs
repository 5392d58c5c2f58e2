//! Color helpers shared by the animation modes.
//!
//! Colors here are packed `0x00RRGGBB` words; the white byte of the
//! WS2812FX RGBW layout is carried through [`color_blend`] but never
//! reaches the canvas.

/// 8-bit unsigned sine wave, one full period over 0..=255.
static SINE_TABLE: [u8; 256] = [
    128, 131, 134, 137, 140, 143, 146, 149, 152, 155, 158, 162, 165, 167, 170, 173, 176, 179, 182,
    185, 188, 190, 193, 196, 198, 201, 203, 206, 208, 211, 213, 215, 218, 220, 222, 224, 226, 228,
    230, 232, 234, 235, 237, 238, 240, 241, 243, 244, 245, 246, 248, 249, 250, 250, 251, 252, 253,
    253, 254, 254, 254, 255, 255, 255, 255, 255, 255, 255, 254, 254, 254, 253, 253, 252, 251, 250,
    250, 249, 248, 246, 245, 244, 243, 241, 240, 238, 237, 235, 234, 232, 230, 228, 226, 224, 222,
    220, 218, 215, 213, 211, 208, 206, 203, 201, 198, 196, 193, 190, 188, 185, 182, 179, 176, 173,
    170, 167, 165, 162, 158, 155, 152, 149, 146, 143, 140, 137, 134, 131, 128, 124, 121, 118, 115,
    112, 109, 106, 103, 100, 97, 93, 90, 88, 85, 82, 79, 76, 73, 70, 67, 65, 62, 59, 57, 54, 52,
    49, 47, 44, 42, 40, 37, 35, 33, 31, 29, 27, 25, 23, 21, 20, 18, 17, 15, 14, 12, 11, 10, 9, 7,
    6, 5, 5, 4, 3, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 2, 2, 3, 4, 5, 5, 6, 7, 9, 10,
    11, 12, 14, 15, 17, 18, 20, 21, 23, 25, 27, 29, 31, 33, 35, 37, 40, 42, 44, 47, 49, 52, 54,
    57, 59, 62, 65, 67, 70, 73, 76, 79, 82, 85, 88, 90, 93, 97, 100, 103, 106, 109, 112, 115, 118,
    121, 124,
];

#[inline]
pub fn sine8(x: u8) -> u8 {
    SINE_TABLE[usize::from(x)]
}

pub const RED: u32 = 0xFF0000;
pub const GREEN: u32 = 0x00FF00;
pub const BLUE: u32 = 0x0000FF;
pub const WHITE: u32 = 0xFFFFFF;
pub const BLACK: u32 = 0x000000;
pub const PURPLE: u32 = 0x400080;
pub const ORANGE: u32 = 0xFF3000;

/// Position on the red → green → blue color wheel.
pub fn color_wheel(pos: u8) -> u32 {
    let pos = 255 - pos;
    if pos < 85 {
        (u32::from(255 - pos * 3) << 16) | u32::from(pos * 3)
    } else if pos < 170 {
        let pos = pos - 85;
        (u32::from(pos * 3) << 8) | u32::from(255 - pos * 3)
    } else {
        let pos = pos - 170;
        (u32::from(pos * 3) << 16) | (u32::from(255 - pos * 3) << 8)
    }
}

/// Linear blend between two packed colors, `blend` = 0..=255.
pub fn color_blend(color1: u32, color2: u32, blend: u8) -> u32 {
    if blend == 0 {
        return color1;
    }
    if blend == 255 {
        return color2;
    }

    let blend = u32::from(blend);
    let mut out = 0u32;
    for shift in [24, 16, 8, 0] {
        let a = (color1 >> shift) & 0xFF;
        let b = (color2 >> shift) & 0xFF;
        out |= ((b * blend + a * (255 - blend)) / 256) << shift;
    }
    out
}

/// Fast 8-bit pseudo-random generator (the FastLED recurrence).
///
/// Deterministic for a given seed, which keeps effect tests reproducible.
#[derive(Debug, Clone)]
pub struct Rand8 {
    seed: u16,
}

impl Rand8 {
    pub fn new(seed: u16) -> Self {
        Rand8 { seed }
    }

    pub fn next(&mut self) -> u8 {
        self.seed = self.seed.wrapping_mul(2053).wrapping_add(13849);
        (self.seed.wrapping_add(self.seed >> 8) & 0xFF) as u8
    }

    /// Random value in `0..lim` (`lim` itself is never produced).
    pub fn below(&mut self, lim: u8) -> u8 {
        ((u16::from(self.next()) * u16::from(lim)) >> 8) as u8
    }

    /// Random index in `0..n`; zero when the range is empty.
    pub fn index(&mut self, n: u16) -> u16 {
        if n == 0 {
            return 0;
        }
        let wide = u32::from(self.next()) << 8 | u32::from(self.next());
        ((wide * u32::from(n)) >> 16) as u16
    }

    /// A new wheel position at least 42 steps away from `pos`.
    pub fn wheel_away_from(&mut self, pos: u8) -> u8 {
        loop {
            let r = self.next();
            let x = pos.abs_diff(r);
            let y = 255 - x;
            if x.min(y) >= 42 {
                return r;
            }
        }
    }
}

impl Default for Rand8 {
    fn default() -> Self {
        Rand8::new(0)
    }
}
