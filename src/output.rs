//! Output device abstraction.

use crate::config::PixelFormat;

/// Driver for the physical LED strips.
///
/// The scheduler double-buffers through this trait: it submits every
/// channel's wire bytes, starts the transfer with [`PixelOutput::send`]
/// and only generates the next frame once [`PixelOutput::is_finished`]
/// reports the hardware caught up. A transfer still running when the
/// next deadline fires is counted against the device, not the pipeline.
pub trait PixelOutput: Send {
    /// (Re)size one channel's transfer buffer. Called on configuration
    /// changes before any further `submit`.
    fn configure(&mut self, channel: usize, pixels: usize, format: PixelFormat);

    /// Stage one channel's wire bytes for the next transfer.
    fn submit(&mut self, channel: usize, data: &[u8]);

    /// Start transferring all staged channels.
    fn send(&mut self);

    /// Whether the previous transfer has completed.
    fn is_finished(&self) -> bool;
}
