//! MJPEG fragment reassembly.
//!
//! RTP/JPEG senders split each frame into fragments identified by a byte
//! offset. The reassembler glues them back together in order, synthesizes
//! the missing JPEG header from the first fragment (see [`header`]) and
//! hands complete frames to the [`slot::FrameSlot`]. Any gap drops the
//! whole frame in flight; the next fragment with offset zero starts over.

pub mod header;
pub mod slot;

use crate::error::{PipelineError, Result};

/// Hard cap on a reassembled frame, header included.
pub const MAX_FRAME_SIZE: usize = 40_000;

const PAYLOAD_HEADER_LEN: usize = 8;
const QTABLE_HEADER_LEN: usize = 4;

/// Reassembles RTP/JPEG fragments into complete JPEG frames.
#[derive(Debug)]
pub struct Reassembler {
    buf: Vec<u8>,
    /// Fragment offset the next packet must carry; `None` while waiting
    /// for a frame start.
    expected: Option<u32>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Reassembler::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler { buf: Vec::with_capacity(MAX_FRAME_SIZE), expected: None }
    }

    /// Buffer of the frame just completed, for publishing. The slot swap
    /// leaves a recycled buffer behind, so reassembly never reallocates
    /// in steady state.
    pub fn frame_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    /// Feed one RTP payload. `restart` is true when the RTP timestamp
    /// changed (a new frame begins), `end` when the marker bit was set.
    /// Returns `Ok(true)` once a frame is complete in [`Self::frame_mut`].
    pub fn push(&mut self, payload: &[u8], restart: bool, end: bool) -> Result<bool> {
        if payload.len() < PAYLOAD_HEADER_LEN {
            return Err(PipelineError::ShortPacket { protocol: "mjpeg", len: payload.len() });
        }

        let offset = u32::from_be_bytes([0, payload[1], payload[2], payload[3]]);
        let frame_type = payload[4];
        let quality = payload[5];
        let width8 = payload[6];
        let height8 = payload[7];
        let mut rest = &payload[PAYLOAD_HEADER_LEN..];

        if restart && offset != 0 {
            self.expected = None;
            return Err(PipelineError::MissingHeader);
        }

        if offset != 0 && Some(offset) != self.expected {
            let expected = self.expected.take().unwrap_or(0);
            return Err(PipelineError::FragmentGap { expected, got: offset });
        }

        if offset == 0 {
            // First fragment: quality 255 means the quantization table is
            // carried in-band, which is the only variant implemented.
            if quality != 255 {
                return Err(PipelineError::UnsupportedQuality(quality));
            }
            if !header::sampling_supported(frame_type) {
                return Err(PipelineError::malformed(
                    "mjpeg",
                    format!("frame type {frame_type} not supported"),
                ));
            }
            if rest.len() < QTABLE_HEADER_LEN {
                return Err(PipelineError::ShortPacket { protocol: "mjpeg", len: rest.len() });
            }

            let precision = rest[1];
            let qlen = usize::from(u16::from_be_bytes([rest[2], rest[3]]));
            if precision != 0 || qlen != 64 || qlen > rest.len() - QTABLE_HEADER_LEN {
                return Err(PipelineError::malformed("mjpeg", "invalid quantization table"));
            }

            let mut qtable = [0u8; 64];
            qtable.copy_from_slice(&rest[QTABLE_HEADER_LEN..QTABLE_HEADER_LEN + 64]);
            rest = &rest[QTABLE_HEADER_LEN + 64..];

            self.buf.clear();
            header::write_header(&mut self.buf, frame_type, width8, height8, &qtable);
            self.expected = Some(0);
        }

        if self.buf.len() + rest.len() > MAX_FRAME_SIZE {
            let size = self.buf.len() + rest.len();
            return Err(PipelineError::FrameTooLarge { size, capacity: MAX_FRAME_SIZE });
        }
        self.buf.extend_from_slice(rest);

        let filled = match self.expected.as_mut() {
            Some(e) => {
                *e += rest.len() as u32;
                *e > 0
            }
            None => false,
        };

        if end && filled {
            self.expected = None;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_fragment(payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0, 0, 0, 0, 0, 255, 2, 2];
        pkt.extend_from_slice(&[0, 0, 0, 64]);
        pkt.extend_from_slice(&[16u8; 64]);
        pkt.extend_from_slice(payload);
        pkt
    }

    fn fragment(offset: u32, payload: &[u8]) -> Vec<u8> {
        let off = offset.to_be_bytes();
        let mut pkt = vec![0, off[1], off[2], off[3], 0, 255, 2, 2];
        pkt.extend_from_slice(payload);
        pkt
    }

    #[test]
    fn single_fragment_frame_completes() {
        let mut r = Reassembler::new();
        let done = r.push(&first_fragment(&[0xAA; 100]), true, true).unwrap();
        assert!(done);

        let frame = r.frame_mut();
        // Synthesized header plus the entropy data.
        assert_eq!(&frame[..2], &[0xff, 0xd8]);
        assert_eq!(frame.len(), 605 + 100);
        assert_eq!(frame[605], 0xAA);
    }

    #[test]
    fn contiguous_fragments_append_in_order() {
        let mut r = Reassembler::new();
        assert!(!r.push(&first_fragment(&[1u8; 100]), true, false).unwrap());
        assert!(!r.push(&fragment(100, &[2u8; 50]), false, false).unwrap());
        assert!(r.push(&fragment(150, &[3u8; 25]), false, true).unwrap());
        assert_eq!(r.frame_mut().len(), 605 + 175);
    }

    #[test]
    fn gap_drops_frame_and_rearms_on_next_start() {
        let mut r = Reassembler::new();
        assert!(!r.push(&first_fragment(&[1u8; 100]), true, false).unwrap());

        let err = r.push(&fragment(300, &[2u8; 50]), false, false).unwrap_err();
        assert!(matches!(err, PipelineError::FragmentGap { expected: 100, got: 300 }));

        // Further mid-frame fragments keep failing until a new start.
        assert!(r.push(&fragment(350, &[2u8; 50]), false, true).is_err());
        assert!(r.push(&first_fragment(&[9u8; 10]), true, true).unwrap());
    }

    #[test]
    fn start_without_offset_zero_is_a_missing_header() {
        let mut r = Reassembler::new();
        let err = r.push(&fragment(100, &[0u8; 10]), true, false).unwrap_err();
        assert!(matches!(err, PipelineError::MissingHeader));
    }

    #[test]
    fn unsupported_quality_is_rejected() {
        let mut pkt = first_fragment(&[0u8; 4]);
        pkt[5] = 80;
        let mut r = Reassembler::new();
        let err = r.push(&pkt, true, true).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedQuality(80)));
    }

    #[test]
    fn bad_quantization_table_is_rejected() {
        let mut r = Reassembler::new();

        let mut pkt = first_fragment(&[]);
        pkt[9] = 1; // precision
        assert!(r.push(&pkt, true, true).is_err());

        let mut pkt = first_fragment(&[]);
        pkt[11] = 32; // length != 64
        assert!(r.push(&pkt, true, true).is_err());
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut r = Reassembler::new();
        assert!(!r.push(&first_fragment(&[0u8; 1000]), true, false).unwrap());

        let mut offset = 1000u32;
        loop {
            let res = r.push(&fragment(offset, &[0u8; 1000]), false, false);
            match res {
                Ok(false) => offset += 1000,
                Err(PipelineError::FrameTooLarge { .. }) => break,
                other => panic!("unexpected result {other:?}"),
            }
            assert!(offset < 50_000, "cap never hit");
        }
    }

    #[test]
    fn empty_frame_does_not_complete() {
        // End marker with no entropy bytes at all keeps waiting.
        let mut pkt = vec![0, 0, 0, 0, 0, 255, 2, 2];
        pkt.extend_from_slice(&[0, 0, 0, 64]);
        pkt.extend_from_slice(&[16u8; 64]);
        let mut r = Reassembler::new();
        assert!(!r.push(&pkt, true, true).unwrap());
    }
}
