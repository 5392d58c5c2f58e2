//! Art-Net DMX reception.
//!
//! ArtDmx packets paint a virtual raster: universe `n` starts at pixel
//! `n * 170` of a row-major surface whose width comes from the
//! configuration, and every channel whose geometry overlaps picks the
//! pixels up. ArtSync packets carry no data and only trigger a render
//! pass for network-driven refresh.

use crate::canvas::Canvas;
use crate::config::{MAX_UNIVERSES, PIXELS_PER_UNIVERSE};
use crate::error::{PipelineError, Result};
use crate::stats::PipelineStats;

const MAGIC: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const OP_SYNC: u16 = 0x5200;
const PROTOCOL_VERSION: u8 = 14;

/// What an Art-Net packet asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum ArtNetEvent {
    /// Pixel data was written to the canvas.
    Dmx,
    /// Sync packet: render now.
    Sync,
}

/// Per-universe sequence tracking.
#[derive(Debug)]
pub struct ArtNetReceiver {
    // -1 = nothing received yet on that universe.
    sequence: [i16; MAX_UNIVERSES as usize],
}

impl Default for ArtNetReceiver {
    fn default() -> Self {
        ArtNetReceiver::new()
    }
}

impl ArtNetReceiver {
    pub fn new() -> Self {
        ArtNetReceiver { sequence: [-1; MAX_UNIVERSES as usize] }
    }

    pub fn reset(&mut self) {
        self.sequence = [-1; MAX_UNIVERSES as usize];
    }

    /// Parse one packet and apply its DMX data to the canvas.
    ///
    /// `universe_offset` is subtracted from the wire universe number with
    /// deliberate wrap-around, so installations can place their cabinet
    /// anywhere in the Art-Net address space. `width` is the virtual
    /// raster's row length in pixels.
    pub fn handle(
        &mut self,
        datagram: &[u8],
        canvas: &Canvas,
        universe_offset: u16,
        width: u16,
        stats: &PipelineStats,
    ) -> Result<ArtNetEvent> {
        if datagram.len() < 18 {
            return Err(PipelineError::ShortPacket { protocol: "artnet", len: datagram.len() });
        }
        if &datagram[..8] != MAGIC {
            return Err(PipelineError::malformed("artnet", "bad magic"));
        }

        let opcode = u16::from_le_bytes([datagram[8], datagram[9]]);
        match opcode {
            OP_SYNC => return Ok(ArtNetEvent::Sync),
            OP_DMX => {}
            other => {
                return Err(PipelineError::malformed(
                    "artnet",
                    format!("unknown opcode {other:#06x}"),
                ));
            }
        }

        if datagram[10] != 0 || datagram[11] != PROTOCOL_VERSION {
            stats.artnet_error();
            return Err(PipelineError::malformed("artnet", "unsupported protocol version"));
        }

        let sequence = datagram[12];
        let wire_universe = u16::from_le_bytes([datagram[14], datagram[15]]);
        let dmx_len = usize::from(u16::from_be_bytes([datagram[16], datagram[17]]));

        let universe = wire_universe.wrapping_sub(universe_offset);
        if universe >= MAX_UNIVERSES {
            stats.artnet_error();
            return Err(PipelineError::UniverseOutOfRange(wire_universe));
        }

        let slot = &mut self.sequence[usize::from(universe)];
        if *slot >= 0 {
            let diff = i32::from(sequence) - i32::from(*slot);
            if diff > 1 && diff < 0xe0 {
                stats.artnet_loss(diff as u32 - 1);
            }
        }
        *slot = i16::from(sequence);

        let width = width.max(1);
        let mut x = i32::from((universe * PIXELS_PER_UNIVERSE) % width);
        let mut y = i32::from((universe * PIXELS_PER_UNIVERSE) / width);
        let data = &datagram[18..];
        let len = dmx_len.min(data.len());
        let mut i = 0;
        while i + 2 < len {
            // DMX channel order on the wire is green, red, blue.
            canvas.rgb_at(x, y, data[i + 1], data[i], data[i + 2]);
            x += 1;
            if x == i32::from(width) {
                y += 1;
                x = 0;
            }
            i += 3;
        }

        stats.artnet_good();
        Ok(ArtNetEvent::Dmx)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canvas::color::depth_reduce;
    use crate::config::{ChannelConfig, ChannelMode, LedConfig, PixelFormat};

    pub(crate) fn dmx_packet(universe: u16, sequence: u8, pixels: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut pkt = Vec::new();
        pkt.extend_from_slice(MAGIC);
        pkt.extend_from_slice(&OP_DMX.to_le_bytes());
        pkt.extend_from_slice(&[0, PROTOCOL_VERSION, sequence, 0]);
        pkt.extend_from_slice(&universe.to_le_bytes());
        pkt.extend_from_slice(&((pixels.len() * 3) as u16).to_be_bytes());
        for &(r, g, b) in pixels {
            pkt.extend_from_slice(&[g, r, b]);
        }
        pkt
    }

    fn test_canvas(width: u16, height: u16) -> Canvas {
        let canvas = Canvas::new(PixelFormat::Grb8);
        let config = LedConfig {
            channels: vec![ChannelConfig {
                mode: ChannelMode::Network,
                sx: width,
                sy: height,
                ..ChannelConfig::default()
            }],
            ..LedConfig::default()
        };
        canvas.apply_config(&config);
        canvas
    }

    #[test]
    fn dmx_paints_the_raster_row_major() {
        let canvas = test_canvas(4, 2);
        let stats = PipelineStats::default();
        let mut rx = ArtNetReceiver::new();

        let pkt = dmx_packet(0, 1, &[(255, 0, 0), (0, 255, 0)]);
        // Raster width 4: universe 0 starts at (0, 0).
        rx.handle(&pkt, &canvas, 0, 4, &stats).unwrap();

        canvas.with_strip(0, |strip, _| {
            assert_eq!(strip.frame().read(0).unwrap(), (depth_reduce(255), 0, 0));
            assert_eq!(strip.frame().read(1).unwrap(), (0, depth_reduce(255), 0));
        });
        assert_eq!(stats.snapshot().artnet_good, 1);
    }

    #[test]
    fn universe_selects_the_raster_offset() {
        let canvas = test_canvas(170, 3);
        let stats = PipelineStats::default();
        let mut rx = ArtNetReceiver::new();

        // Width equals one universe, so universe 1 is row 1.
        let pkt = dmx_packet(1, 1, &[(9, 9, 9)]);
        rx.handle(&pkt, &canvas, 0, 170, &stats).unwrap();

        canvas.with_strip(0, |strip, _| {
            assert_ne!(strip.frame().read(170).unwrap(), (0, 0, 0));
            assert_eq!(strip.frame().read(0).unwrap(), (0, 0, 0));
        });
    }

    #[test]
    fn sequence_gap_counts_lost_packets() {
        let canvas = test_canvas(4, 1);
        let stats = PipelineStats::default();
        let mut rx = ArtNetReceiver::new();

        for seq in [1, 2, 4] {
            rx.handle(&dmx_packet(0, seq, &[(1, 1, 1)]), &canvas, 0, 4, &stats).unwrap();
        }
        assert_eq!(stats.snapshot().artnet_loss, 1);
        assert_eq!(stats.snapshot().artnet_good, 3);

        // Wrap-around of the 8-bit sequence is not loss.
        rx.handle(&dmx_packet(0, 250, &[(1, 1, 1)]), &canvas, 0, 4, &stats).unwrap();
        rx.handle(&dmx_packet(0, 1, &[(1, 1, 1)]), &canvas, 0, 4, &stats).unwrap();
        assert_eq!(stats.snapshot().artnet_loss, 1);
    }

    #[test]
    fn universe_offset_wraps_intentionally() {
        let canvas = test_canvas(4, 1);
        let stats = PipelineStats::default();
        let mut rx = ArtNetReceiver::new();

        // Offset larger than the wire universe wraps around and lands
        // out of range.
        let err = rx.handle(&dmx_packet(3, 1, &[(1, 1, 1)]), &canvas, 10, 4, &stats).unwrap_err();
        assert!(matches!(err, PipelineError::UniverseOutOfRange(3)));
        assert_eq!(stats.snapshot().artnet_error, 1);

        // Offset matching the wire universe maps to universe 0.
        rx.handle(&dmx_packet(10, 1, &[(1, 1, 1)]), &canvas, 10, 4, &stats).unwrap();
        assert_eq!(stats.snapshot().artnet_good, 1);
    }

    #[test]
    fn sync_asks_for_a_render_pass() {
        let canvas = test_canvas(4, 1);
        let stats = PipelineStats::default();
        let mut rx = ArtNetReceiver::new();

        let mut pkt = dmx_packet(0, 1, &[]);
        pkt[8..10].copy_from_slice(&OP_SYNC.to_le_bytes());
        assert_eq!(rx.handle(&pkt, &canvas, 0, 4, &stats).unwrap(), ArtNetEvent::Sync);
    }

    #[test]
    fn truncated_dmx_data_is_clamped() {
        let canvas = test_canvas(4, 1);
        let stats = PipelineStats::default();
        let mut rx = ArtNetReceiver::new();

        // Declared length larger than the datagram.
        let mut pkt = dmx_packet(0, 1, &[(1, 1, 1)]);
        pkt[16..18].copy_from_slice(&510u16.to_be_bytes());
        rx.handle(&pkt, &canvas, 0, 4, &stats).unwrap();
        assert_eq!(stats.snapshot().artnet_good, 1);
    }
}
