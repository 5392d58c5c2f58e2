//! Ingress protocol demultiplexer.
//!
//! All three wire protocols share one UDP port. Classification peeks at
//! the first byte: `(` opens a cube-marker datagram, `A` an Art-Net
//! packet, anything else is RTP/JPEG.

pub mod artnet;
pub mod cube;
pub mod rtp;

use crate::canvas::Canvas;
use crate::config::LedConfig;
use crate::error::{PipelineError, Result};
use crate::mjpeg::Reassembler;
use crate::mjpeg::slot::FrameSlot;
use crate::stats::PipelineStats;

/// What the ingress worker should do after a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Datagram consumed; nothing further.
    Handled,
    /// Datagram completed a frame or carried a sync: render now.
    Render,
}

/// Stateful demultiplexer owned by the ingress worker.
#[derive(Debug, Default)]
pub struct Demux {
    rtp: rtp::RtpSession,
    artnet: artnet::ArtNetReceiver,
}

impl Demux {
    pub fn new() -> Self {
        Demux::default()
    }

    pub fn reset(&mut self) {
        self.rtp.reset();
        self.artnet.reset();
    }

    /// Route one datagram through the matching parser. The verdict comes
    /// back alongside the parse result: a marker-bit packet requests a
    /// render even when its fragment was unusable, so a frame rate of zero
    /// still produces a frame per completed transmission.
    pub fn handle(
        &mut self,
        datagram: &[u8],
        canvas: &Canvas,
        reassembler: &mut Reassembler,
        slot: &FrameSlot,
        config: &LedConfig,
        stats: &PipelineStats,
    ) -> (Verdict, Result<()>) {
        if datagram.len() > 4 && datagram[0] == b'(' {
            return (Verdict::Handled, cube::handle(datagram, canvas));
        }

        if datagram.len() > 8 && datagram[0] == b'A' {
            return match self.artnet.handle(
                datagram,
                canvas,
                config.artnet_universe_offset,
                config.artnet_width,
                stats,
            ) {
                Ok(artnet::ArtNetEvent::Sync) => (Verdict::Render, Ok(())),
                Ok(artnet::ArtNetEvent::Dmx) => (Verdict::Handled, Ok(())),
                Err(err) => (Verdict::Handled, Err(err)),
            };
        }

        let packet = match self.rtp.parse(datagram, stats) {
            Ok(Some(packet)) => packet,
            Ok(None) => return (Verdict::Handled, Ok(())),
            Err(err) => return (Verdict::Handled, Err(err)),
        };

        // The marker bit doubles as the render trigger for senders that
        // do not use ArtSync, whatever happens to the fragment itself.
        let verdict = if packet.marker { Verdict::Render } else { Verdict::Handled };

        match reassembler.push(packet.payload, packet.restart, packet.marker) {
            Ok(true) => {
                if slot.try_publish(reassembler.frame_mut()) {
                    stats.mjpeg_good();
                } else {
                    // Decoder still busy with the previous frame.
                    stats.mjpeg_loss(1);
                }
            }
            Ok(false) => {}
            Err(err) => {
                self.rtp.clear_timestamp();
                match &err {
                    PipelineError::FragmentGap { .. } => stats.mjpeg_loss(1),
                    PipelineError::MissingHeader => {}
                    _ => stats.mjpeg_error(),
                }
                return (verdict, Err(err));
            }
        }

        (verdict, Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, ChannelMode, PixelFormat};

    fn setup() -> (Demux, Canvas, Reassembler, FrameSlot, LedConfig, PipelineStats) {
        let canvas = Canvas::new(PixelFormat::Grb8);
        let config = LedConfig {
            channels: vec![ChannelConfig {
                mode: ChannelMode::Network,
                sx: 16,
                sy: 16,
                ..ChannelConfig::default()
            }],
            ..LedConfig::default()
        };
        canvas.apply_config(&config);
        (Demux::new(), canvas, Reassembler::new(), FrameSlot::new(), config, PipelineStats::default())
    }

    fn jpeg_fragment(payload_len: usize) -> Vec<u8> {
        let mut p = vec![0, 0, 0, 0, 0, 255, 2, 2];
        p.extend_from_slice(&[0, 0, 0, 64]);
        p.extend_from_slice(&[16u8; 64]);
        p.extend_from_slice(&vec![0xAB; payload_len]);
        p
    }

    fn rtp_wrap(seq: u16, ts: u32, marker: bool, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0x80, if marker { 0x80 | 26 } else { 26 }];
        pkt.extend_from_slice(&seq.to_be_bytes());
        pkt.extend_from_slice(&ts.to_be_bytes());
        pkt.extend_from_slice(&[0, 0, 0, 1]);
        pkt.extend_from_slice(payload);
        pkt
    }

    #[tokio::test]
    async fn complete_jpeg_frame_is_published_and_triggers_render() {
        let (mut demux, canvas, mut reassembler, slot, config, stats) = setup();

        let pkt = rtp_wrap(1, 42, true, &jpeg_fragment(50));
        let (verdict, res) = demux.handle(&pkt, &canvas, &mut reassembler, &slot, &config, &stats);
        res.unwrap();
        assert_eq!(verdict, Verdict::Render);
        assert_eq!(stats.snapshot().mjpeg_good, 1);

        let frame = slot.acquire().await;
        assert_eq!(frame.len(), 605 + 50);
    }

    #[test]
    fn cube_datagrams_route_to_the_marker_parser() {
        let (mut demux, canvas, mut reassembler, slot, config, stats) = setup();
        let (verdict, res) =
            demux.handle(b"(0.0,0.0,0.0)", &canvas, &mut reassembler, &slot, &config, &stats);
        res.unwrap();
        assert_eq!(verdict, Verdict::Handled);
        canvas.with_strip(0, |strip, _| {
            assert_ne!(strip.frame().read(0).unwrap(), (0, 0, 0));
        });
    }

    #[test]
    fn artnet_datagrams_route_to_the_dmx_parser() {
        let (mut demux, canvas, mut reassembler, slot, config, stats) = setup();
        let pkt = artnet::tests::dmx_packet(0, 1, &[(255, 255, 255)]);
        let (_, res) = demux.handle(&pkt, &canvas, &mut reassembler, &slot, &config, &stats);
        res.unwrap();
        assert_eq!(stats.snapshot().artnet_good, 1);
    }

    #[test]
    fn fragment_gap_counts_one_lost_frame() {
        let (mut demux, canvas, mut reassembler, slot, config, stats) = setup();

        let first = rtp_wrap(1, 7, false, &jpeg_fragment(100));
        let (_, res) = demux.handle(&first, &canvas, &mut reassembler, &slot, &config, &stats);
        res.unwrap();

        // Final fragment with the wrong offset: the frame is lost, but its
        // marker bit must still request a render.
        let mut bad = vec![0, 0, 0, 99, 0, 255, 2, 2];
        bad.extend_from_slice(&[0u8; 30]);
        let pkt = rtp_wrap(2, 7, true, &bad);
        let (verdict, res) =
            demux.handle(&pkt, &canvas, &mut reassembler, &slot, &config, &stats);
        let err = res.unwrap_err();
        assert!(err.is_loss());
        assert_eq!(verdict, Verdict::Render);
        assert_eq!(stats.snapshot().mjpeg_loss, 1);
        assert_eq!(stats.snapshot().mjpeg_good, 0);
    }
}
