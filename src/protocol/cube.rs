//! ASCII cube-marker protocol.
//!
//! A volumetric installation stacks the channels into a cube: `z` picks
//! the channel, `x`/`y` the pixel on it, all normalized to `0.0..=1.0`.
//! A datagram is a run of up to 32 triples like `(0.5,0.25,1.0)`; triple
//! `i` moves marker `i` to the given point, painted white, or switches it
//! off when any coordinate is negative.

use crate::canvas::Canvas;
use crate::config::MAX_CHANNELS;
use crate::error::{PipelineError, Result};

const MAX_MARKERS: usize = 32;

fn clamp01(a: f32) -> f32 {
    a.clamp(0.0, 1.0)
}

fn parse_triple(text: &str) -> Option<(f32, f32, f32, &str)> {
    let rest = text.strip_prefix('(')?;
    // A truncated final triple may lack its closing parenthesis; three
    // parsed coordinates are enough.
    let (body, rest) = match rest.find([')', '(']) {
        Some(at) if rest.as_bytes()[at] == b')' => (&rest[..at], &rest[at + 1..]),
        Some(at) => (&rest[..at], &rest[at..]),
        None => (rest, ""),
    };
    let mut parts = body.split(',').map(str::trim);
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y, z, rest))
}

fn place_marker(canvas: &Canvas, x: f32, y: f32, z: f32) {
    let channel = (clamp01(z) * MAX_CHANNELS as f32).floor() as usize;
    let (sx, sy) = canvas
        .with_strip(0, |strip, _| (strip.width() as f32, strip.height() as f32))
        .unwrap_or((0.0, 0.0));
    let pos = (clamp01(x) * sx).floor() + (clamp01(y) * sy).floor() * sx;

    let v = if x < 0.0 || y < 0.0 || z < 0.0 { 0 } else { 255 };
    canvas.set_pixel(channel, pos as u16, v, v, v);
}

/// Parse one marker datagram and apply it to the canvas.
pub fn handle(datagram: &[u8], canvas: &Canvas) -> Result<()> {
    let text = std::str::from_utf8(datagram)
        .map_err(|_| PipelineError::malformed("cube", "not valid UTF-8"))?;

    let mut rest = text.trim_start();
    for _ in 0..MAX_MARKERS {
        if !rest.starts_with('(') {
            break;
        }
        let Some((x, y, z, tail)) = parse_triple(rest) else {
            return Err(PipelineError::malformed("cube", "invalid marker syntax"));
        };
        place_marker(canvas, x, y, z);
        rest = match tail.find('(') {
            Some(at) => &tail[at..],
            None => "",
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, ChannelMode, LedConfig, PixelFormat};

    fn cube_canvas() -> Canvas {
        let canvas = Canvas::new(PixelFormat::Grb8);
        let channels = (0..MAX_CHANNELS)
            .map(|_| ChannelConfig {
                mode: ChannelMode::Network,
                sx: 8,
                sy: 16,
                ..ChannelConfig::default()
            })
            .collect();
        canvas.apply_config(&LedConfig { channels, ..LedConfig::default() });
        canvas
    }

    fn lit_pixels(canvas: &Canvas, channel: usize) -> Vec<usize> {
        canvas
            .with_strip(channel, |strip, _| {
                (0..strip.pixel_count())
                    .filter(|&i| strip.frame().read(i) != Some((0, 0, 0)))
                    .collect()
            })
            .unwrap()
    }

    #[test]
    fn marker_lights_the_mapped_pixel() {
        let canvas = cube_canvas();
        handle(b"(0.0,0.0,0.0)", &canvas).unwrap();
        assert_eq!(lit_pixels(&canvas, 0), vec![0]);

        // z selects the channel.
        handle(b"(0.0,0.0,0.4)", &canvas).unwrap();
        assert_eq!(lit_pixels(&canvas, 3), vec![0]);
    }

    #[test]
    fn several_markers_in_one_datagram() {
        let canvas = cube_canvas();
        handle(b"(0.0,0.0,0.0)(0.5,0.0,0.0)", &canvas).unwrap();
        assert_eq!(lit_pixels(&canvas, 0), vec![0, 4]);
    }

    #[test]
    fn negative_coordinate_clears_the_marker() {
        let canvas = cube_canvas();
        handle(b"(0.0,0.0,0.0)", &canvas).unwrap();
        handle(b"(-1.0,0.0,0.0)", &canvas).unwrap();
        assert!(lit_pixels(&canvas, 0).is_empty());
    }

    #[test]
    fn truncated_final_triple_still_sets_its_marker() {
        let canvas = cube_canvas();
        handle(b"(0.0,0.0,0.0)(0.5,0.0,0.0", &canvas).unwrap();
        assert_eq!(lit_pixels(&canvas, 0), vec![0, 4]);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let canvas = cube_canvas();
        assert!(handle(b"(0.1,0.2)", &canvas).is_err());
        assert!(handle(b"(a,b,c)", &canvas).is_err());
        assert!(handle(b"(0.1,0.2,", &canvas).is_err());
    }
}
