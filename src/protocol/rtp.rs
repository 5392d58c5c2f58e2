//! RTP header parsing and sequence tracking.

use crate::error::{PipelineError, Result};
use crate::stats::PipelineStats;

const HEADER_LEN: usize = 12;
const PT_JPEG: u8 = 26;

/// One parsed RTP packet.
#[derive(Debug)]
pub struct RtpPacket<'a> {
    pub marker: bool,
    pub payload: &'a [u8],
    /// True when the timestamp changed, so the payload starts a new frame.
    pub restart: bool,
}

/// Per-sender RTP receive state.
///
/// Sequence gaps below five packets are counted as loss; larger jumps are
/// treated as a sender restart and only logged. A parse failure further
/// down the pipeline clears the timestamp so the next packet is always
/// treated as a frame start.
#[derive(Debug, Default)]
pub struct RtpSession {
    packets_seen: bool,
    last_seq: u16,
    last_ts: u32,
}

impl RtpSession {
    pub fn new() -> Self {
        RtpSession::default()
    }

    pub fn reset(&mut self) {
        *self = RtpSession::default();
    }

    /// Force the next packet to be treated as a frame start.
    pub fn clear_timestamp(&mut self) {
        self.last_ts = 0;
    }

    /// Parse one datagram. Returns `None` for valid RTP that does not
    /// carry JPEG; those packets are ignored without counting an error.
    pub fn parse<'a>(
        &mut self,
        datagram: &'a [u8],
        stats: &PipelineStats,
    ) -> Result<Option<RtpPacket<'a>>> {
        if datagram.len() < HEADER_LEN {
            return Err(PipelineError::ShortPacket { protocol: "rtp", len: datagram.len() });
        }

        let version = datagram[0] >> 6;
        let extension = datagram[0] & 0x10 != 0;
        let csrc_count = usize::from(datagram[0] & 0x0F);
        let marker = datagram[1] & 0x80 != 0;
        let payload_type = datagram[1] & 0x7F;
        let seq = u16::from_be_bytes([datagram[2], datagram[3]]);
        let ts = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);

        let header_len = HEADER_LEN + csrc_count * 4;
        if datagram.len() < header_len {
            return Err(PipelineError::ShortPacket { protocol: "rtp", len: datagram.len() });
        }
        if version != 2 {
            return Err(PipelineError::RtpVersion(version));
        }
        if extension {
            return Err(PipelineError::RtpExtension);
        }
        if payload_type != PT_JPEG {
            return Ok(None);
        }

        let mut restart = true;
        if self.packets_seen {
            let diff = seq.wrapping_sub(self.last_seq);
            if diff > 1 {
                tracing::debug!(seq, last_seq = self.last_seq, "sequence jump");
                if diff < 5 {
                    stats.rtp_loss(u32::from(diff) - 1);
                }
            } else if ts == self.last_ts {
                restart = false;
            }
        }
        self.last_seq = seq;
        self.last_ts = ts;
        self.packets_seen = true;

        Ok(Some(RtpPacket { marker, payload: &datagram[header_len..], restart }))
    }
}
