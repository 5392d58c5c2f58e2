//! Configuration snapshot types.
//!
//! The pipeline never mutates configuration in place. The external
//! configuration layer (persistence, HTTP control plane) builds a complete
//! [`LedConfig`] and publishes it through the handle's single-slot mailbox;
//! the render scheduler applies it between frames, so every worker sees
//! either the old or the fully-new snapshot.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fx::FxMode;

/// Number of LED channels (physical strip outputs) supported.
pub const MAX_CHANNELS: usize = 8;

/// Highest accepted Art-Net universe after offset adjustment.
pub const MAX_UNIVERSES: u16 = 20;

/// RGB pixels per Art-Net universe (510 DMX channels / 3).
pub const PIXELS_PER_UNIVERSE: u16 = 170;

/// Physical wiring orientation of a channel's LED matrix.
///
/// Four rotations, each plain or horizontally flipped, each wired either
/// "zigzag" (every row runs the same direction, the return wire is hidden)
/// or "meander" (serpentine: odd rows run backwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    R0Zigzag,
    R0FlippedZigzag,
    R90Zigzag,
    R90FlippedZigzag,
    R180Zigzag,
    R180FlippedZigzag,
    R270Zigzag,
    R270FlippedZigzag,
    R0Meander,
    R0FlippedMeander,
    R90Meander,
    R90FlippedMeander,
    R180Meander,
    R180FlippedMeander,
    R270Meander,
    R270FlippedMeander,
}

impl Orientation {
    /// All sixteen orientations, in wire-format order.
    pub const ALL: [Orientation; 16] = [
        Orientation::R0Zigzag,
        Orientation::R0FlippedZigzag,
        Orientation::R90Zigzag,
        Orientation::R90FlippedZigzag,
        Orientation::R180Zigzag,
        Orientation::R180FlippedZigzag,
        Orientation::R270Zigzag,
        Orientation::R270FlippedZigzag,
        Orientation::R0Meander,
        Orientation::R0FlippedMeander,
        Orientation::R90Meander,
        Orientation::R90FlippedMeander,
        Orientation::R180Meander,
        Orientation::R180FlippedMeander,
        Orientation::R270Meander,
        Orientation::R270FlippedMeander,
    ];

    /// Serpentine wiring: odd output rows run right-to-left.
    pub fn is_meander(self) -> bool {
        matches!(
            self,
            Orientation::R0Meander
                | Orientation::R0FlippedMeander
                | Orientation::R90Meander
                | Orientation::R90FlippedMeander
                | Orientation::R180Meander
                | Orientation::R180FlippedMeander
                | Orientation::R270Meander
                | Orientation::R270FlippedMeander
        )
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::R0Zigzag
    }
}

/// What a channel displays each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    /// All pixels black.
    Off,
    /// Pixels come from the network (MJPEG blocks); the scheduler leaves
    /// the buffer alone.
    Network,
    White,
    Gray,
    Red,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
    /// Horizontal luminance ramp.
    FadeX,
    /// Vertical luminance ramp.
    FadeY,
    /// Diagonal luminance ramp.
    FadeXy,
    /// Alternating vertical stripes.
    LinesX,
    /// Alternating horizontal stripes.
    LinesY,
    /// Checkerboard.
    LinesXy,
    /// One colored pixel in each corner.
    Corners,
    /// Colored frame around a black center.
    Square,
    /// Rolling five-phase hardware test pattern.
    ProductionTest,
    /// Procedural animation driven by the effects engine.
    Effect(FxMode),
    /// Delegated to the external playlist collaborator.
    Playlist,
}

impl Default for ChannelMode {
    fn default() -> Self {
        ChannelMode::Off
    }
}

/// Wire pixel format of the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Three bytes per pixel, green-red-blue order (WS2812 family).
    #[default]
    Grb8,
    /// One luminance byte per pixel.
    Luminance8,
    /// Sixteen bits per primary, big-endian, RGB order.
    Rgb16,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Grb8 => 3,
            PixelFormat::Luminance8 => 1,
            PixelFormat::Rgb16 => 6,
        }
    }
}

/// Per-channel geometry and mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub mode: ChannelMode,
    pub orientation: Orientation,
    /// Matrix width in pixels.
    pub sx: u16,
    /// Matrix height in pixels.
    pub sy: u16,
    /// Offset of this channel's matrix within the virtual raster.
    pub ox: i16,
    pub oy: i16,
    /// Up to three physical pixel indices forced to black (dead pixels,
    /// status LEDs soldered into the strip).
    pub black: [Option<u16>; 3],
}

impl ChannelConfig {
    /// Number of addressable pixels on this channel.
    pub fn pixel_count(&self) -> usize {
        usize::from(self.sx) * usize::from(self.sy)
    }
}

/// Global color calibration, applied identically to every channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coloring {
    pub contrast: f32,
    pub brightness: f32,
    pub red_contrast: f32,
    pub red_brightness: f32,
    pub green_contrast: f32,
    pub green_brightness: f32,
    pub blue_contrast: f32,
    pub blue_brightness: f32,
    pub saturation: f32,
    /// Hue shift in thirds of the six-step hue wheel.
    pub hue: f32,
}

impl Default for Coloring {
    fn default() -> Self {
        Coloring {
            contrast: 1.0,
            brightness: 0.0,
            red_contrast: 1.0,
            red_brightness: 0.0,
            green_contrast: 1.0,
            green_brightness: 0.0,
            blue_contrast: 1.0,
            blue_brightness: 0.0,
            saturation: 1.0,
            hue: 0.0,
        }
    }
}

/// Complete configuration snapshot consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    /// Target frame rate in Hz. Zero or negative disables periodic ticking;
    /// the scheduler then renders once per network signal.
    pub refresh_rate: i16,
    /// LEDs skipped at the start of every strip before pixel 0.
    pub prefix_leds: u8,
    /// Per-channel geometry, at most [`MAX_CHANNELS`] entries.
    pub channels: Vec<ChannelConfig>,
    /// Row width of the Art-Net virtual raster.
    pub artnet_width: u16,
    /// Subtracted from incoming universe numbers, with intentional
    /// wrap-around truncation.
    pub artnet_universe_offset: u16,
    pub format: PixelFormat,
    pub coloring: Coloring,
}

impl Default for LedConfig {
    fn default() -> Self {
        LedConfig {
            refresh_rate: 20,
            prefix_leds: 0,
            channels: Vec::new(),
            artnet_width: PIXELS_PER_UNIVERSE,
            artnet_universe_offset: 0,
            format: PixelFormat::default(),
            coloring: Coloring::default(),
        }
    }
}

impl LedConfig {
    /// Parse a configuration snapshot from YAML, as handed over by the
    /// external configuration store.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: LedConfig = serde_yaml_ng::from_str(yaml)?;
        config.channels.truncate(MAX_CHANNELS);
        Ok(config)
    }

    /// Frame interval in milliseconds, `None` when network-driven.
    pub fn frame_interval_ms(&self) -> Option<f64> {
        (self.refresh_rate > 0).then(|| 1000.0 / f64::from(self.refresh_rate))
    }
}
