//! Bridge between the JPEG decoder and the canvas.
//!
//! Decoding itself is pluggable: anything that can turn a baseline JPEG
//! byte stream into 8×8 MCU blocks implements [`BlockDecoder`]. The
//! bridge owns the worker loop (wait for a frame, decode, fan the blocks
//! out to every network channel) and the scan-type bookkeeping that maps
//! MCU indices to canvas coordinates.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::canvas::Canvas;
use crate::error::Result;
use crate::mjpeg::slot::FrameSlot;
use crate::stats::PipelineStats;

/// Chroma layout of a decoded image, deciding how many 8×8 blocks each
/// MCU carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Grayscale,
    H1V1,
    H2V1,
    H1V2,
    H2V2,
}

impl ScanType {
    /// MCU footprint in pixels.
    pub fn mcu_size(self) -> (i32, i32) {
        match self {
            ScanType::Grayscale | ScanType::H1V1 => (8, 8),
            ScanType::H2V1 => (16, 8),
            ScanType::H1V2 => (8, 16),
            ScanType::H2V2 => (16, 16),
        }
    }
}

/// Image geometry reported by the decoder after the headers are parsed.
#[derive(Debug, Clone, Copy)]
pub struct ImageInfo {
    pub width: u16,
    pub height: u16,
    pub mcus_per_row: u16,
    pub scan: ScanType,
}

/// One decoded MCU: up to four 8×8 blocks per component, packed at byte
/// offsets 0, 64, 128 and 192 the way the scan type dictates.
pub struct McuBlocks {
    pub r: [u8; 256],
    pub g: [u8; 256],
    pub b: [u8; 256],
}

impl McuBlocks {
    pub fn new() -> Self {
        McuBlocks { r: [0; 256], g: [0; 256], b: [0; 256] }
    }
}

impl Default for McuBlocks {
    fn default() -> Self {
        McuBlocks::new()
    }
}

/// A baseline JPEG decoder producing MCUs in scan order.
pub trait BlockDecoder: Send {
    /// Decode one complete frame, calling `emit` once per MCU with the
    /// MCU's scan-order index.
    fn decode(
        &mut self,
        frame: &[u8],
        emit: &mut dyn FnMut(&ImageInfo, u32, &McuBlocks),
    ) -> Result<()>;
}

fn block(blocks: &McuBlocks, at: usize) -> (&[u8; 64], &[u8; 64], &[u8; 64]) {
    // Slice-to-array conversions cannot fail for at <= 192.
    (
        blocks.r[at..at + 64].try_into().unwrap_or(&[0; 64]),
        blocks.g[at..at + 64].try_into().unwrap_or(&[0; 64]),
        blocks.b[at..at + 64].try_into().unwrap_or(&[0; 64]),
    )
}

/// Scatter one MCU onto the canvas at its raster position.
pub fn fan_out(canvas: &Canvas, info: &ImageInfo, no: u32, blocks: &McuBlocks) {
    let per_row = u32::from(info.mcus_per_row.max(1));
    let (mw, mh) = info.scan.mcu_size();
    let x = mw * (no % per_row) as i32;
    let y = mh * (no / per_row) as i32;

    let (r, g, b) = block(blocks, 0);
    match info.scan {
        ScanType::Grayscale => canvas.block_at(x, y, r, r, r),
        ScanType::H1V1 => canvas.block_at(x, y, r, g, b),
        ScanType::H2V1 => {
            canvas.block_at(x, y, r, g, b);
            let (r, g, b) = block(blocks, 64);
            canvas.block_at(x + 8, y, r, g, b);
        }
        ScanType::H1V2 => {
            canvas.block_at(x, y, r, g, b);
            let (r, g, b) = block(blocks, 128);
            canvas.block_at(x, y + 8, r, g, b);
        }
        ScanType::H2V2 => {
            canvas.block_at(x, y, r, g, b);
            let (r, g, b) = block(blocks, 64);
            canvas.block_at(x + 8, y, r, g, b);
            let (r, g, b) = block(blocks, 128);
            canvas.block_at(x, y + 8, r, g, b);
            let (r, g, b) = block(blocks, 192);
            canvas.block_at(x + 8, y + 8, r, g, b);
        }
    }
}

/// Decode worker: consumes frames from the slot until cancelled.
pub(crate) async fn run(
    slot: Arc<FrameSlot>,
    canvas: Arc<Canvas>,
    stats: Arc<PipelineStats>,
    mut decoder: Box<dyn BlockDecoder>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = slot.acquire() => frame,
        };

        let res = decoder.decode(&frame, &mut |info, no, blocks| {
            fan_out(&canvas, info, no, blocks);
        });
        match res {
            Ok(()) => debug!(len = frame.len(), "frame decoded"),
            Err(err) => {
                stats.mjpeg_error();
                warn!(%err, "dropping undecodable frame");
            }
        }
    }
    debug!("decode worker stopped");
}
