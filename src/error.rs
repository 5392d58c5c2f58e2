//! Error types for the rendering pipeline.
//!
//! Errors follow the pipeline's recovery taxonomy: malformed input,
//! sequence loss, capacity overruns and decode failures are all recovered
//! locally by dropping the smallest unit of state (a datagram, a fragment
//! or a frame). Nothing in here is fatal to the pipeline; errors are
//! logged and surfaced as counters (see [`crate::stats`]).

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Main error type for ingress parsing, reassembly and decoding.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("{protocol}: short packet ({len} bytes)")]
    ShortPacket { protocol: &'static str, len: usize },

    #[error("{protocol}: {detail}")]
    Malformed { protocol: &'static str, detail: String },

    #[error("RTP version {0} is not supported")]
    RtpVersion(u8),

    #[error("RTP header extensions are not supported")]
    RtpExtension,

    #[error("Art-Net universe {0} out of range")]
    UniverseOutOfRange(u16),

    #[error("JPEG quality {0} is not implemented (only Q=255 raw tables)")]
    UnsupportedQuality(u8),

    #[error("missing JPEG header, dropping image")]
    MissingHeader,

    #[error("lost fragment, expected offset {expected} but got {got}")]
    FragmentGap { expected: u32, got: u32 },

    #[error("JPEG frame exceeds buffer capacity ({size} > {capacity})")]
    FrameTooLarge { size: usize, capacity: usize },

    #[error("JPEG decode failed: {detail}")]
    Decode { detail: String },

    #[error("socket error")]
    Io(#[from] std::io::Error),

    #[error("configuration parse error")]
    Config(#[from] serde_yaml_ng::Error),
}

impl PipelineError {
    /// Helper constructor for malformed-input errors with protocol context.
    pub fn malformed(protocol: &'static str, detail: impl Into<String>) -> Self {
        PipelineError::Malformed { protocol, detail: detail.into() }
    }

    /// Helper constructor for decode failures reported by the external decoder.
    pub fn decode(detail: impl Into<String>) -> Self {
        PipelineError::Decode { detail: detail.into() }
    }

    /// Whether this error abandons a frame in flight (bumps the loss
    /// counter) rather than only the error counter.
    pub fn is_loss(&self) -> bool {
        matches!(self, PipelineError::FragmentGap { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<PipelineError>();
    }

    #[test]
    fn messages_carry_context() {
        let err = PipelineError::FragmentGap { expected: 1200, got: 2400 };
        assert!(err.to_string().contains("1200"));
        assert!(err.is_loss());

        let err = PipelineError::malformed("artnet", "bad magic");
        assert!(err.to_string().contains("artnet"));
        assert!(!err.is_loss());
    }
}
