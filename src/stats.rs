//! Shared telemetry counters.
//!
//! Every fault in the pipeline is advisory: parsers and the scheduler bump
//! a counter and carry on. The external telemetry layer reads a
//! [`StatsSnapshot`] whenever it likes; the workers only ever increment.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// Monotonic counters shared by the ingress, decode and render workers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    rtp_good: AtomicU32,
    rtp_error: AtomicU32,
    rtp_loss: AtomicU32,
    mjpeg_good: AtomicU32,
    mjpeg_error: AtomicU32,
    mjpeg_loss: AtomicU32,
    artnet_good: AtomicU32,
    artnet_error: AtomicU32,
    artnet_loss: AtomicU32,
    frames_on_time: AtomicU32,
    frames_late: AtomicU32,
    frames_device_slow: AtomicU32,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub rtp_good: u32,
    pub rtp_error: u32,
    pub rtp_loss: u32,
    pub mjpeg_good: u32,
    pub mjpeg_error: u32,
    pub mjpeg_loss: u32,
    pub artnet_good: u32,
    pub artnet_error: u32,
    pub artnet_loss: u32,
    pub frames_on_time: u32,
    pub frames_late: u32,
    pub frames_device_slow: u32,
}

impl PipelineStats {
    pub fn rtp_good(&self) {
        self.rtp_good.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rtp_error(&self) {
        self.rtp_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `n` lost RTP packets (sequence gap of `n`).
    pub fn rtp_loss(&self, n: u32) {
        self.rtp_loss.fetch_add(n, Ordering::Relaxed);
    }

    pub fn mjpeg_good(&self) {
        self.mjpeg_good.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mjpeg_error(&self) {
        self.mjpeg_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mjpeg_loss(&self, n: u32) {
        self.mjpeg_loss.fetch_add(n, Ordering::Relaxed);
    }

    pub fn artnet_good(&self) {
        self.artnet_good.fetch_add(1, Ordering::Relaxed);
    }

    pub fn artnet_error(&self) {
        self.artnet_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn artnet_loss(&self, n: u32) {
        self.artnet_loss.fetch_add(n, Ordering::Relaxed);
    }

    pub fn frame_on_time(&self) {
        self.frames_on_time.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_late(&self) {
        self.frames_late.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_device_slow(&self) {
        self.frames_device_slow.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rtp_good: self.rtp_good.load(Ordering::Relaxed),
            rtp_error: self.rtp_error.load(Ordering::Relaxed),
            rtp_loss: self.rtp_loss.load(Ordering::Relaxed),
            mjpeg_good: self.mjpeg_good.load(Ordering::Relaxed),
            mjpeg_error: self.mjpeg_error.load(Ordering::Relaxed),
            mjpeg_loss: self.mjpeg_loss.load(Ordering::Relaxed),
            artnet_good: self.artnet_good.load(Ordering::Relaxed),
            artnet_error: self.artnet_error.load(Ordering::Relaxed),
            artnet_loss: self.artnet_loss.load(Ordering::Relaxed),
            frames_on_time: self.frames_on_time.load(Ordering::Relaxed),
            frames_late: self.frames_late.load(Ordering::Relaxed),
            frames_device_slow: self.frames_device_slow.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = PipelineStats::default();
        stats.rtp_good();
        stats.rtp_good();
        stats.artnet_loss(3);
        stats.frame_late();

        let snap = stats.snapshot();
        assert_eq!(snap.rtp_good, 2);
        assert_eq!(snap.artnet_loss, 3);
        assert_eq!(snap.frames_late, 1);
        assert_eq!(snap.mjpeg_error, 0);
    }
}
