//! Color correction.
//!
//! Every pixel passes through the same chain before it reaches the output
//! buffer: byte → unit float, hue/saturation adjustment in HSV space,
//! global and per-primary contrast/brightness, clamp, byte again, and a
//! bit-depth reduction table that rounds each byte to the nearest value
//! with a single significant bit. The table is a crude gamma/dithering
//! compromise inherited from the hardware this drives; changing it changes
//! what calibrated senders see.

use std::sync::LazyLock;

use crate::config::Coloring;

#[inline]
fn byte_to_unit(c: u8) -> f32 {
    f32::from(c) * (1.0 / 255.0)
}

#[inline]
fn clamp01(a: f32) -> f32 {
    a.clamp(0.0, 1.0)
}

#[inline]
fn unit_to_byte(c: f32) -> u8 {
    (255.0 * clamp01(c)) as u8
}

/// Shift hue and scale saturation by round-tripping through HSV.
///
/// Hue lives on the six-step wheel (units are sixths of a full rotation);
/// the configured shift is scaled by three so a configuration value of 2.0
/// is a full rotation.
fn adjust_hsv(coloring: &Coloring, r: &mut f32, g: &mut f32, b: &mut f32) {
    let max = r.max(g.max(*b));
    let min = r.min(g.min(*b));

    let mut hue = 0.0f32;
    if min != max {
        if max == *r {
            hue = (*g - *b) / (max - min);
        } else if max == *g {
            hue = (*b - *r) / (max - min) + 2.0;
        } else {
            hue = (*r - *g) / (max - min) + 4.0;
        }
        if hue < 0.0 {
            hue += 6.0;
        }
    }

    let mut s = 0.0f32;
    if max > 0.0 {
        s = (max - min) / max;
    }
    let v = max;

    hue = (hue + coloring.hue * 3.0 + 6.0).rem_euclid(6.0);
    s = clamp01(s * coloring.saturation);

    let hi = hue.floor();
    let f = hue - hi;
    match hi as i32 {
        1 => {
            *r = v * (1.0 - s * f);
            *g = v;
            *b = v * (1.0 - s);
        }
        2 => {
            *r = v * (1.0 - s);
            *g = v;
            *b = v * (1.0 - s * (1.0 - f));
        }
        3 => {
            *r = v * (1.0 - s);
            *g = v * (1.0 - s * f);
            *b = v;
        }
        4 => {
            *r = v * (1.0 - s * (1.0 - f));
            *g = v * (1.0 - s);
            *b = v;
        }
        5 => {
            *r = v;
            *g = v * (1.0 - s);
            *b = v * (1.0 - s * f);
        }
        _ => {
            *r = v;
            *g = v * (1.0 - s * (1.0 - f));
            *b = v * (1.0 - s);
        }
    }
}

fn apply_contrast(coloring: &Coloring, r: &mut f32, g: &mut f32, b: &mut f32) {
    *r = *r * coloring.contrast * coloring.red_contrast
        + coloring.brightness
        + coloring.red_brightness;
    *g = *g * coloring.contrast * coloring.green_contrast
        + coloring.brightness
        + coloring.green_brightness;
    *b = *b * coloring.contrast * coloring.blue_contrast
        + coloring.brightness
        + coloring.blue_brightness;
}

/// Bit-depth reduction table: each byte maps to the nearest value that
/// keeps only its most significant set bit. Built once, iterating from the
/// top so each entry can compare against the previously chosen candidate.
static DEPTH_MAP: LazyLock<[u8; 256]> = LazyLock::new(|| {
    let mut map = [0u8; 256];
    let mut last: i16 = 0x200;
    for c in (0..=255i16).rev() {
        let mut ones = 1u8;
        let mut l: i16 = 0;
        let mut bit: i16 = 0x80;
        while bit > 0 && ones > 0 {
            if c & bit != 0 {
                l |= bit;
                ones -= 1;
            }
            bit >>= 1;
        }
        if c - l < last - c {
            map[c as usize] = l as u8;
            last = l;
        } else {
            map[c as usize] = last as u8;
        }
    }
    map
});

/// Reduce one corrected byte to the device's effective bit depth.
pub fn depth_reduce(c: u8) -> u8 {
    DEPTH_MAP[usize::from(c)]
}

/// Full color-correction chain for one pixel.
pub fn correct(coloring: &Coloring, r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let mut fr = byte_to_unit(r);
    let mut fg = byte_to_unit(g);
    let mut fb = byte_to_unit(b);

    adjust_hsv(coloring, &mut fr, &mut fg, &mut fb);
    apply_contrast(coloring, &mut fr, &mut fg, &mut fb);

    (
        depth_reduce(unit_to_byte(fr)),
        depth_reduce(unit_to_byte(fg)),
        depth_reduce(unit_to_byte(fb)),
    )
}
