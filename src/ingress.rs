//! UDP ingress worker.
//!
//! Receives every datagram on the shared port, runs it through the
//! protocol demultiplexer and nudges the render scheduler when a packet
//! asks for a frame. Parse failures are counted and logged at debug
//! level; a hostile or misconfigured sender must not take the pipeline
//! down.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::canvas::Canvas;
use crate::config::LedConfig;
use crate::mjpeg::Reassembler;
use crate::mjpeg::slot::FrameSlot;
use crate::protocol::{Demux, Verdict};
use crate::stats::PipelineStats;

// Matches the sender-side MTU assumption; RTP fragments never exceed it.
const DATAGRAM_MAX: usize = 1500;

pub(crate) struct Ingress {
    socket: UdpSocket,
    canvas: Arc<Canvas>,
    stats: Arc<PipelineStats>,
    slot: Arc<FrameSlot>,
    config_rx: watch::Receiver<LedConfig>,
    render_signal: Arc<Notify>,
    cancel: CancellationToken,
}

impl Ingress {
    pub(crate) fn new(
        socket: UdpSocket,
        canvas: Arc<Canvas>,
        stats: Arc<PipelineStats>,
        slot: Arc<FrameSlot>,
        config_rx: watch::Receiver<LedConfig>,
        render_signal: Arc<Notify>,
        cancel: CancellationToken,
    ) -> Self {
        Ingress { socket, canvas, stats, slot, config_rx, render_signal, cancel }
    }

    pub(crate) async fn run(mut self) {
        let mut demux = Demux::new();
        let mut reassembler = Reassembler::new();
        let mut config = self.config_rx.borrow_and_update().clone();
        let mut buf = [0u8; DATAGRAM_MAX];

        loop {
            let len = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, _peer)) => len,
                    Err(err) => {
                        debug!(%err, "udp receive failed");
                        continue;
                    }
                },
            };

            if self.config_rx.has_changed().unwrap_or(false) {
                config = self.config_rx.borrow_and_update().clone();
                // Sequence state is meaningless across a reconfigure.
                demux.reset();
            }

            let (verdict, result) =
                demux.handle(&buf[..len], &self.canvas, &mut reassembler, &self.slot, &config, &self.stats);
            match result {
                Ok(()) => self.stats.rtp_good(),
                Err(err) => {
                    self.stats.rtp_error();
                    debug!(%err, len, "dropped datagram");
                }
            }
            // A marker-bit packet wakes the renderer even when its
            // fragment was dropped.
            if verdict == Verdict::Render {
                self.render_signal.notify_one();
            }
        }
        debug!("ingress worker stopped");
    }
}
