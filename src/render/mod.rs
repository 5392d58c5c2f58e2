//! Render scheduler.
//!
//! The scheduler owns the frame cadence: push the previous frame to the
//! output device, wait for the next deadline (or, when the refresh rate
//! is zero, for a network trigger), then repaint every channel according
//! to its mode. Configuration swaps are taken between frames, so a frame
//! never mixes old and new geometry.

pub(crate) mod fills;
pub mod pacer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::canvas::{Canvas, ChannelStrip};
use crate::config::{ChannelMode, Coloring, LedConfig, MAX_CHANNELS};
use crate::fx::{FxSegment, PixelSink};
use crate::output::PixelOutput;
use crate::playlist::Playlist;
use crate::stats::PipelineStats;
use pacer::{Pace, Pacer, TICK_MS};

/// Adapter letting an effect segment write into a locked channel strip.
struct StripSink<'a> {
    strip: &'a mut ChannelStrip,
    coloring: &'a Coloring,
}

impl PixelSink for StripSink<'_> {
    fn set(&mut self, index: u16, r: u8, g: u8, b: u8) {
        self.strip.set_pixel(self.coloring, index, r, g, b);
    }
}

pub(crate) struct Scheduler {
    canvas: Arc<Canvas>,
    stats: Arc<PipelineStats>,
    output: Box<dyn PixelOutput>,
    playlist: Box<dyn Playlist>,
    config_rx: watch::Receiver<LedConfig>,
    render_signal: Arc<Notify>,
    cancel: CancellationToken,
    segments: Vec<Option<FxSegment>>,
    pacer: Pacer,
    epoch: Instant,
    counter: u32,
}

impl Scheduler {
    pub(crate) fn new(
        canvas: Arc<Canvas>,
        stats: Arc<PipelineStats>,
        output: Box<dyn PixelOutput>,
        playlist: Box<dyn Playlist>,
        config_rx: watch::Receiver<LedConfig>,
        render_signal: Arc<Notify>,
        cancel: CancellationToken,
    ) -> Self {
        Scheduler {
            canvas,
            stats,
            output,
            playlist,
            config_rx,
            render_signal,
            cancel,
            segments: (0..MAX_CHANNELS).map(|_| None).collect(),
            pacer: Pacer::new(0),
            epoch: Instant::now(),
            counter: 0,
        }
    }

    fn now_ticks(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 / TICK_MS
    }

    pub(crate) async fn run(mut self) {
        self.epoch = Instant::now();
        self.pacer = Pacer::new(0);
        let initial = self.config_rx.borrow_and_update().clone();
        self.apply_config(&initial);

        loop {
            {
                let canvas = Arc::clone(&self.canvas);
                let output = &mut self.output;
                for c in 0..canvas.channel_count() {
                    canvas.with_strip(c, |strip, _| output.submit(c, strip.frame().as_bytes()));
                }
            }
            self.output.send();

            let interval = self.config_rx.borrow().frame_interval_ms();
            let proceed = match interval {
                Some(ms) => self.pace(ms).await,
                None => self.wait_for_signal().await,
            };
            if !proceed {
                break;
            }

            if self.config_rx.has_changed().unwrap_or(false) {
                let config = self.config_rx.borrow_and_update().clone();
                self.apply_config(&config);
            } else {
                self.generate().await;
            }
        }
        debug!("render worker stopped");
    }

    /// Sleep until the next frame deadline. Late wakeups and unfinished
    /// device transfers are counted and re-armed without rendering.
    /// Returns false on shutdown.
    async fn pace(&mut self, interval_ms: f64) -> bool {
        loop {
            let deadline = self.pacer.schedule(interval_ms);
            let when = self.epoch + Duration::from_millis(deadline * TICK_MS);
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = sleep_until(when) => {}
            }

            let now = self.now_ticks();
            if self.pacer.classify(now) == Pace::Late {
                self.stats.frame_late();
                self.pacer.reanchor(now);
                continue;
            }
            if !self.output.is_finished() {
                self.stats.frame_device_slow();
                continue;
            }
            self.stats.frame_on_time();
            return true;
        }
    }

    /// Network-driven refresh: render only when the ingress worker says
    /// a frame or sync arrived.
    async fn wait_for_signal(&mut self) -> bool {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = self.render_signal.notified() => {}
            }
            if !self.output.is_finished() {
                self.stats.frame_device_slow();
                continue;
            }
            self.stats.frame_on_time();
            return true;
        }
    }

    fn apply_config(&mut self, config: &LedConfig) {
        info!(
            channels = config.channels.len(),
            refresh_rate = config.refresh_rate,
            "applying configuration"
        );
        let resized = self.canvas.apply_config(config);
        for c in 0..MAX_CHANNELS {
            let Some((mode, pixels, total)) = self.canvas.with_strip(c, |strip, _| {
                (strip.mode(), strip.pixel_count(), strip.frame().pixel_count())
            }) else {
                continue;
            };
            if resized[c] {
                debug!(channel = c, pixels = total, "channel resized");
            }
            self.output.configure(c, total, config.format);
            // Effect state always restarts on a configuration swap.
            self.segments[c] = match mode {
                ChannelMode::Effect(fx) => Some(FxSegment::new(fx, pixels as u16)),
                _ => None,
            };
        }
    }

    async fn generate(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        let now = self.now_ticks();

        for c in 0..MAX_CHANNELS {
            let canvas = Arc::clone(&self.canvas);
            let Some(mode) = canvas.with_strip(c, |strip, _| strip.mode()) else {
                continue;
            };
            match mode {
                // Network channels are painted by the ingress and decode
                // workers; the scheduler leaves them alone.
                ChannelMode::Network => {}
                ChannelMode::Playlist => self.playlist.advance(now, c, &canvas).await,
                ChannelMode::Effect(_) => {
                    if let Some(seg) = self.segments[c].as_mut() {
                        canvas.with_strip(c, |strip, coloring| {
                            let mut sink = StripSink { strip, coloring };
                            seg.tick(now, &mut sink);
                        });
                    }
                }
                other => {
                    let counter = self.counter;
                    canvas.with_strip(c, |strip, coloring| {
                        paint_fill(other, strip, coloring, counter);
                    });
                }
            }
        }
    }
}

/// Static fills for the non-animated channel modes.
fn paint_fill(mode: ChannelMode, strip: &mut ChannelStrip, coloring: &Coloring, counter: u32) {
    match mode {
        ChannelMode::Off => fills::solid(strip, coloring, 0, 0, 0),
        ChannelMode::White => fills::solid(strip, coloring, 255, 255, 255),
        ChannelMode::Gray => fills::solid(strip, coloring, 128, 128, 128),
        ChannelMode::Red => fills::solid(strip, coloring, 255, 0, 0),
        ChannelMode::Yellow => fills::solid(strip, coloring, 255, 255, 0),
        ChannelMode::Green => fills::solid(strip, coloring, 0, 255, 0),
        ChannelMode::Cyan => fills::solid(strip, coloring, 0, 255, 255),
        ChannelMode::Blue => fills::solid(strip, coloring, 0, 0, 255),
        ChannelMode::Magenta => fills::solid(strip, coloring, 255, 0, 255),
        ChannelMode::FadeX => fills::fade_x(strip, coloring),
        ChannelMode::FadeY => fills::fade_y(strip, coloring),
        ChannelMode::FadeXy => fills::fade_xy(strip, coloring),
        ChannelMode::LinesX => fills::lines_x(strip, coloring),
        ChannelMode::LinesY => fills::lines_y(strip, coloring),
        ChannelMode::LinesXy => fills::lines_xy(strip, coloring),
        ChannelMode::Corners => fills::corners(strip, coloring),
        ChannelMode::Square => fills::square(strip, coloring),
        ChannelMode::ProductionTest => fills::production_test(strip, coloring, counter),
        ChannelMode::Network | ChannelMode::Effect(_) | ChannelMode::Playlist => {}
    }
}
