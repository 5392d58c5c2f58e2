//! Network-driven rendering pipeline for large LED installations.
//!
//! Ledwall receives pixel data on a single UDP port, speaks three wire
//! protocols on it side by side and turns them into per-channel LED
//! frames at a fixed or network-driven cadence:
//!
//! - **RTP/MJPEG** (RFC 2435): fragmented baseline JPEG frames, headers
//!   reconstructed from the payload quantization tables
//! - **Art-Net DMX/Sync**: raw RGB universes rastered across the matrix
//! - **Cube markers**: plain-text 3D points for volumetric builds
//!
//! The JPEG decoder and the LED driver are pluggable through the
//! [`BlockDecoder`] and [`PixelOutput`] traits, so the same pipeline
//! runs against SPI strips, network relays or a test harness.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledwall::{
//!     BlockDecoder, ImageInfo, LedConfig, LedWall, McuBlocks, PixelFormat, PixelOutput,
//! };
//!
//! struct NullDecoder;
//!
//! impl BlockDecoder for NullDecoder {
//!     fn decode(
//!         &mut self,
//!         _frame: &[u8],
//!         _emit: &mut dyn FnMut(&ImageInfo, u32, &McuBlocks),
//!     ) -> ledwall::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! struct NullOutput;
//!
//! impl PixelOutput for NullOutput {
//!     fn configure(&mut self, _channel: usize, _pixels: usize, _format: PixelFormat) {}
//!     fn submit(&mut self, _channel: usize, _data: &[u8]) {}
//!     fn send(&mut self) {}
//!     fn is_finished(&self) -> bool {
//!         true
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ledwall::Result<()> {
//!     let yaml = std::fs::read_to_string("ledwall.yaml")?;
//!     let config = LedConfig::from_yaml(&yaml)?;
//!
//!     let wall = LedWall::bind(
//!         "0.0.0.0:5004",
//!         config,
//!         Box::new(NullDecoder),
//!         Box::new(NullOutput),
//!     )
//!     .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
//!     wall.shutdown().await;
//!     Ok(())
//! }
//! ```

// Canvas and configuration
pub mod canvas;
pub mod config;
mod error;
pub mod stats;

// Ingress pipeline
mod ingress;
pub mod mjpeg;
pub mod protocol;

// Frame generation
pub mod decode;
pub mod fx;
pub mod render;

// Collaborator seams
mod output;
mod playlist;

pub use canvas::Canvas;
pub use config::{
    ChannelConfig, ChannelMode, Coloring, LedConfig, Orientation, PixelFormat,
};
pub use decode::{BlockDecoder, ImageInfo, McuBlocks, ScanType};
pub use error::{PipelineError, Result};
pub use fx::FxMode;
pub use output::PixelOutput;
pub use playlist::{NoPlaylist, Playlist};
pub use stats::{PipelineStats, StatsSnapshot};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ingress::Ingress;
use crate::mjpeg::slot::FrameSlot;
use crate::render::Scheduler;

/// A running pipeline: ingress, decode and render workers sharing one
/// canvas.
///
/// Dropping the handle cancels the workers; [`LedWall::shutdown`]
/// additionally waits for them to finish.
pub struct LedWall {
    canvas: Arc<Canvas>,
    stats: Arc<PipelineStats>,
    config_tx: watch::Sender<LedConfig>,
    cancel: CancellationToken,
    local_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl LedWall {
    /// Bind a UDP socket and start the pipeline with no playlist.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: LedConfig,
        decoder: Box<dyn BlockDecoder>,
        output: Box<dyn PixelOutput>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::spawn(socket, config, decoder, output, Box::new(NoPlaylist)))
    }

    /// Start the pipeline on an already-bound socket.
    pub fn spawn(
        socket: UdpSocket,
        config: LedConfig,
        decoder: Box<dyn BlockDecoder>,
        output: Box<dyn PixelOutput>,
        playlist: Box<dyn Playlist>,
    ) -> Self {
        let local_addr = socket.local_addr().ok();
        let canvas = Arc::new(Canvas::new(config.format));
        // Geometry must be in place before the first datagram, not the
        // first scheduler pass.
        canvas.apply_config(&config);
        let stats = Arc::new(PipelineStats::default());
        let slot = Arc::new(FrameSlot::new());
        let render_signal = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let (config_tx, config_rx) = watch::channel(config);

        let ingress = Ingress::new(
            socket,
            Arc::clone(&canvas),
            Arc::clone(&stats),
            Arc::clone(&slot),
            config_rx.clone(),
            Arc::clone(&render_signal),
            cancel.clone(),
        );
        let scheduler = Scheduler::new(
            Arc::clone(&canvas),
            Arc::clone(&stats),
            output,
            playlist,
            config_rx,
            Arc::clone(&render_signal),
            cancel.clone(),
        );
        let tasks = vec![
            tokio::spawn(ingress.run()),
            tokio::spawn(decode::run(
                slot,
                Arc::clone(&canvas),
                Arc::clone(&stats),
                decoder,
                cancel.clone(),
            )),
            tokio::spawn(scheduler.run()),
        ];

        LedWall { canvas, stats, config_tx, cancel, local_addr, tasks }
    }

    /// The bound UDP address, when the socket can report one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Shared canvas, for playlists and inspection.
    pub fn canvas(&self) -> Arc<Canvas> {
        Arc::clone(&self.canvas)
    }

    /// Current pipeline counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Swap in a new configuration. The render scheduler applies it at
    /// the next frame boundary; network sequence state resets.
    pub fn update_config(&self, config: LedConfig) {
        let _ = self.config_tx.send(config);
    }

    /// Stop all workers and wait for them to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for LedWall {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
