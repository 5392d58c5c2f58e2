//! Per-channel pixel buffers and the mapping engine.
//!
//! The canvas is the shared surface all three workers write through: the
//! ingress worker (Art-Net rasters, cube markers), the decode worker (MJPEG
//! blocks) and the render worker (fills and effects). Each channel's buffer
//! sits behind its own mutex and carries a copy of its geometry, so a
//! mapping operation always sees geometry and buffer in agreement even
//! while a configuration swap is in flight on another channel.
//!
//! Logical coordinates go through three steps before they hit the buffer:
//! translate by the channel offset and bounds-check, apply one of the
//! sixteen wiring orientations, and reverse odd rows for meander
//! (serpentine) wiring. The resulting linear index is color-corrected,
//! masked and encoded into the device wire format.

pub mod color;

use std::sync::{Mutex, RwLock};

use crate::config::{
    ChannelConfig, ChannelMode, Coloring, LedConfig, MAX_CHANNELS, Orientation, PixelFormat,
};

/// Per-channel byte buffer in the device wire format.
///
/// Sized once per configuration swap and overwritten in place every frame;
/// submitting a frame never allocates.
#[derive(Debug, Clone)]
pub struct OutputFrame {
    format: PixelFormat,
    pixels: usize,
    bytes: Vec<u8>,
}

impl OutputFrame {
    fn new(format: PixelFormat) -> Self {
        OutputFrame { format, pixels: 0, bytes: Vec::new() }
    }

    fn resize(&mut self, format: PixelFormat, pixels: usize) {
        self.format = format;
        self.pixels = pixels;
        self.bytes.clear();
        self.bytes.resize(pixels * format.bytes_per_pixel(), 0);
    }

    /// Number of pixels, including any LED prefix.
    pub fn pixel_count(&self) -> usize {
        self.pixels
    }

    /// Raw wire bytes, ready for the output device.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encode one corrected pixel. Out-of-range indices are ignored.
    fn write(&mut self, index: usize, r: u8, g: u8, b: u8) {
        if index >= self.pixels {
            return;
        }
        let at = index * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Grb8 => {
                self.bytes[at] = g;
                self.bytes[at + 1] = r;
                self.bytes[at + 2] = b;
            }
            PixelFormat::Luminance8 => {
                // Rec.709 luma weights.
                let luma =
                    (2126 * u32::from(r) + 7152 * u32::from(g) + 722 * u32::from(b)) / 10000;
                self.bytes[at] = luma as u8;
            }
            PixelFormat::Rgb16 => {
                for (slot, v) in [r, g, b].into_iter().enumerate() {
                    self.bytes[at + slot * 2] = v;
                    self.bytes[at + slot * 2 + 1] = v;
                }
            }
        }
    }

    /// Decode one pixel back to RGB, for tests and the telemetry layer.
    pub fn read(&self, index: usize) -> Option<(u8, u8, u8)> {
        if index >= self.pixels {
            return None;
        }
        let at = index * self.format.bytes_per_pixel();
        Some(match self.format {
            PixelFormat::Grb8 => (self.bytes[at + 1], self.bytes[at], self.bytes[at + 2]),
            PixelFormat::Luminance8 => (self.bytes[at], self.bytes[at], self.bytes[at]),
            PixelFormat::Rgb16 => (self.bytes[at], self.bytes[at + 2], self.bytes[at + 4]),
        })
    }
}

/// One channel's geometry plus its output buffer.
#[derive(Debug)]
pub struct ChannelStrip {
    mode: ChannelMode,
    orientation: Orientation,
    sx: i32,
    sy: i32,
    ox: i32,
    oy: i32,
    black: [Option<u16>; 3],
    prefix: usize,
    frame: OutputFrame,
}

impl ChannelStrip {
    fn new(format: PixelFormat) -> Self {
        ChannelStrip {
            mode: ChannelMode::Off,
            orientation: Orientation::default(),
            sx: 0,
            sy: 0,
            ox: 0,
            oy: 0,
            black: [None; 3],
            prefix: 0,
            frame: OutputFrame::new(format),
        }
    }

    /// Returns true when the pixel count changed (effect state must reset).
    fn apply(&mut self, cc: &ChannelConfig, prefix: usize, format: PixelFormat) -> bool {
        let pixels = cc.pixel_count() + prefix;
        let resized = pixels != self.frame.pixel_count() || format != self.frame.format;
        self.mode = cc.mode;
        self.orientation = cc.orientation;
        self.sx = i32::from(cc.sx);
        self.sy = i32::from(cc.sy);
        self.ox = i32::from(cc.ox);
        self.oy = i32::from(cc.oy);
        self.black = cc.black;
        self.prefix = prefix;
        if resized {
            self.frame.resize(format, pixels);
        }
        resized
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Matrix width in pixels.
    pub fn width(&self) -> i32 {
        self.sx
    }

    /// Matrix height in pixels.
    pub fn height(&self) -> i32 {
        self.sy
    }

    /// Addressable pixels on this channel, excluding the LED prefix.
    pub fn pixel_count(&self) -> usize {
        (self.sx * self.sy).max(0) as usize
    }

    pub fn frame(&self) -> &OutputFrame {
        &self.frame
    }

    /// Color-correct, mask and store one pixel by physical index.
    pub fn set_pixel(&mut self, coloring: &Coloring, index: u16, r: u8, g: u8, b: u8) {
        let (mut r, mut g, mut b) = color::correct(coloring, r, g, b);
        if self.black.iter().any(|m| *m == Some(index)) {
            r = 0;
            g = 0;
            b = 0;
        }
        self.frame.write(usize::from(index) + self.prefix, r, g, b);
    }

    /// Map a logical coordinate through offset, orientation and wiring.
    /// Out-of-bounds coordinates are a no-op.
    pub fn rgb_at(&mut self, coloring: &Coloring, x: i32, y: i32, r: u8, g: u8, b: u8) {
        let mut x = x - self.ox;
        let mut y = y - self.oy;
        let mut sx = self.sx;
        let mut sy = self.sy;

        if x < 0 || y < 0 || x >= sx || y >= sy {
            return;
        }

        use Orientation as O;
        match self.orientation {
            O::R0Zigzag | O::R0Meander => {}
            O::R0FlippedZigzag | O::R0FlippedMeander => {
                x = sx - x - 1;
            }
            O::R90Zigzag | O::R90Meander => {
                std::mem::swap(&mut sx, &mut sy);
                std::mem::swap(&mut x, &mut y);
                x = sx - x - 1;
            }
            O::R90FlippedZigzag | O::R90FlippedMeander => {
                std::mem::swap(&mut sx, &mut sy);
                std::mem::swap(&mut x, &mut y);
                x = sx - x - 1;
                y = sy - y - 1;
            }
            O::R180Zigzag | O::R180Meander => {
                x = sx - x - 1;
                y = sy - y - 1;
            }
            O::R180FlippedZigzag | O::R180FlippedMeander => {
                y = sy - y - 1;
            }
            O::R270Zigzag | O::R270Meander => {
                std::mem::swap(&mut sx, &mut sy);
                std::mem::swap(&mut x, &mut y);
                y = sy - y - 1;
            }
            O::R270FlippedZigzag | O::R270FlippedMeander => {
                std::mem::swap(&mut sx, &mut sy);
                std::mem::swap(&mut x, &mut y);
            }
        }

        if self.orientation.is_meander() && (y & 1) == 1 {
            x = sx - x - 1;
        }

        self.set_pixel(coloring, (x + y * sx) as u16, r, g, b);
    }
}

/// Shared pixel surface for all channels.
pub struct Canvas {
    channels: [Mutex<ChannelStrip>; MAX_CHANNELS],
    coloring: RwLock<Coloring>,
}

impl Canvas {
    pub fn new(format: PixelFormat) -> Self {
        Canvas {
            channels: std::array::from_fn(|_| Mutex::new(ChannelStrip::new(format))),
            coloring: RwLock::new(Coloring::default()),
        }
    }

    /// Number of channel slots (fixed by the hardware).
    pub fn channel_count(&self) -> usize {
        MAX_CHANNELS
    }

    /// Install a configuration snapshot. Returns, per channel, whether its
    /// pixel count changed (the caller resets effect state and device
    /// buffer sizes for those).
    pub fn apply_config(&self, config: &LedConfig) -> [bool; MAX_CHANNELS] {
        *self.coloring.write().unwrap() = config.coloring;
        let mut resized = [false; MAX_CHANNELS];
        let off = ChannelConfig::default();
        for (i, slot) in self.channels.iter().enumerate() {
            let cc = config.channels.get(i).unwrap_or(&off);
            resized[i] =
                slot.lock().unwrap().apply(cc, usize::from(config.prefix_leds), config.format);
        }
        resized
    }

    /// Run `f` with one channel's strip locked, plus the current coloring.
    pub fn with_strip<R>(&self, channel: usize, f: impl FnOnce(&mut ChannelStrip, &Coloring) -> R) -> Option<R> {
        let slot = self.channels.get(channel)?;
        let coloring = *self.coloring.read().unwrap();
        let mut strip = slot.lock().unwrap();
        Some(f(&mut strip, &coloring))
    }

    /// Corrected write of one physical pixel on one channel.
    pub fn set_pixel(&self, channel: usize, index: u16, r: u8, g: u8, b: u8) {
        self.with_strip(channel, |strip, coloring| strip.set_pixel(coloring, index, r, g, b));
    }

    /// Write a logical coordinate to every channel whose geometry contains it.
    pub fn rgb_at(&self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        let coloring = *self.coloring.read().unwrap();
        for slot in &self.channels {
            slot.lock().unwrap().rgb_at(&coloring, x, y, r, g, b);
        }
    }

    /// Place a decoded 8×8 RGB block. Only channels in network mode take
    /// block writes; everything else is driven by the scheduler.
    pub fn block_at(&self, x: i32, y: i32, r: &[u8; 64], g: &[u8; 64], b: &[u8; 64]) {
        let coloring = *self.coloring.read().unwrap();
        for slot in &self.channels {
            let mut strip = slot.lock().unwrap();
            if strip.mode() != ChannelMode::Network {
                continue;
            }
            for iy in 0..8 {
                for ix in 0..8 {
                    let p = iy * 8 + ix;
                    strip.rgb_at(&coloring, x + ix as i32, y + iy as i32, r[p], g[p], b[p]);
                }
            }
        }
    }

}
