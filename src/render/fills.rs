//! Static test patterns.
//!
//! Each fill repaints a whole channel from its geometry; they run every
//! frame, so the patterns follow configuration changes immediately. The
//! ramp patterns use logical coordinates and therefore rotate with the
//! channel's orientation.

use crate::canvas::ChannelStrip;
use crate::config::Coloring;

pub(crate) fn solid(strip: &mut ChannelStrip, coloring: &Coloring, r: u8, g: u8, b: u8) {
    for i in (0..strip.pixel_count() as u16).rev() {
        strip.set_pixel(coloring, i, r, g, b);
    }
}

pub(crate) fn fade_x(strip: &mut ChannelStrip, coloring: &Coloring) {
    let sx = strip.width();
    for x in 0..sx {
        let c = ramp(x, sx);
        for y in (0..strip.height()).rev() {
            strip.rgb_at(coloring, x, y, c, c, c);
        }
    }
}

pub(crate) fn fade_y(strip: &mut ChannelStrip, coloring: &Coloring) {
    let sy = strip.height();
    for y in 0..sy {
        let c = ramp(y, sy);
        for x in (0..strip.width()).rev() {
            strip.rgb_at(coloring, x, y, c, c, c);
        }
    }
}

pub(crate) fn fade_xy(strip: &mut ChannelStrip, coloring: &Coloring) {
    let scale = 255.0 / diagonal(strip.width() as f32, strip.height() as f32);
    for y in 0..strip.height() {
        for x in (0..strip.width()).rev() {
            let c = (diagonal(x as f32, y as f32) * scale) as u8;
            strip.rgb_at(coloring, x, y, c, c, c);
        }
    }
}

pub(crate) fn lines_x(strip: &mut ChannelStrip, coloring: &Coloring) {
    for x in 0..strip.width() {
        let c = ((x & 1) * 255) as u8;
        for y in (0..strip.height()).rev() {
            strip.rgb_at(coloring, x, y, c, c, c);
        }
    }
}

pub(crate) fn lines_y(strip: &mut ChannelStrip, coloring: &Coloring) {
    for y in 0..strip.height() {
        let c = ((y & 1) * 255) as u8;
        for x in (0..strip.width()).rev() {
            strip.rgb_at(coloring, x, y, c, c, c);
        }
    }
}

pub(crate) fn lines_xy(strip: &mut ChannelStrip, coloring: &Coloring) {
    for y in 0..strip.height() {
        for x in (0..strip.width()).rev() {
            let c = (((x + y) & 1) * 255) as u8;
            strip.rgb_at(coloring, x, y, c, c, c);
        }
    }
}

/// White, blue, red and green markers in the four corners, for checking
/// orientation settings against the physical build.
pub(crate) fn corners(strip: &mut ChannelStrip, coloring: &Coloring) {
    let (sx, sy) = (strip.width(), strip.height());
    for y in 0..sy {
        for x in (0..sx).rev() {
            let (r, g, b) = if x == 0 && y == 0 {
                (255, 255, 255)
            } else if x == sx - 1 && y == 0 {
                (0, 0, 255)
            } else if x == 0 && y == sy - 1 {
                (255, 0, 0)
            } else if x == sx - 1 && y == sy - 1 {
                (0, 255, 0)
            } else {
                (0, 0, 0)
            };
            strip.rgb_at(coloring, x, y, r, g, b);
        }
    }
}

/// Colored frame: each edge gets its own color so mirrored orientations
/// stand out.
pub(crate) fn square(strip: &mut ChannelStrip, coloring: &Coloring) {
    let (sx, sy) = (strip.width(), strip.height());
    for y in 0..sy {
        for x in (0..sx).rev() {
            let (r, g, b) = if x == 0 && y != sy - 1 {
                (255, 255, 255)
            } else if y == sy - 1 {
                (255, 0, 0)
            } else if x == sx - 1 {
                (0, 255, 0)
            } else if y == 0 {
                (0, 0, 255)
            } else {
                (0, 0, 0)
            };
            strip.rgb_at(coloring, x, y, r, g, b);
        }
    }
}

/// Rolling five-phase factory pattern: gray bars, then a ramp on each
/// primary, then a white ramp, scrolling one pixel per frame.
pub(crate) fn production_test(strip: &mut ChannelStrip, coloring: &Coloring, counter: u32) {
    let size = strip.pixel_count() as u32;
    for i in 0..size {
        let c = i.wrapping_add(counter);
        let phase = (c / 256) % 5;
        let c = (c & 255) as u8;
        let (r, g, b) = match phase {
            0 => {
                if (c / 12) & 1 == 1 {
                    (128, 128, 128)
                } else {
                    (0, 0, 0)
                }
            }
            1 => (c, 0, 0),
            2 => (0, c, 0),
            3 => (0, 0, c),
            _ => (c, c, c),
        };
        strip.set_pixel(coloring, i as u16, r, g, b);
    }
}

fn ramp(at: i32, size: i32) -> u8 {
    if size <= 1 {
        return 0;
    }
    (at * 255 / (size - 1)) as u8
}

fn diagonal(x: f32, y: f32) -> f32 {
    (x * x + y * y).sqrt().max(1.0)
}
