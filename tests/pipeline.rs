//! End-to-end tests: UDP datagrams in, device frames out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;

use ledwall::{
    BlockDecoder, ChannelConfig, ChannelMode, ImageInfo, LedConfig, LedWall, McuBlocks,
    NoPlaylist, PixelFormat, PixelOutput, Result, ScanType,
};

#[derive(Default)]
struct OutputLog {
    configured: Vec<(usize, usize)>,
    sends: usize,
    frames: Vec<Vec<u8>>,
}

struct RecordingOutput(Arc<Mutex<OutputLog>>);

impl PixelOutput for RecordingOutput {
    fn configure(&mut self, channel: usize, pixels: usize, _format: PixelFormat) {
        self.0.lock().unwrap().configured.push((channel, pixels));
    }

    fn submit(&mut self, channel: usize, data: &[u8]) {
        let mut log = self.0.lock().unwrap();
        if log.frames.len() <= channel {
            log.frames.resize(channel + 1, Vec::new());
        }
        log.frames[channel] = data.to_vec();
    }

    fn send(&mut self) {
        self.0.lock().unwrap().sends += 1;
    }

    fn is_finished(&self) -> bool {
        true
    }
}

/// Stand-in for a real JPEG decoder: ignores the bitstream and emits a
/// fixed 16x16 raster of green MCUs.
struct SolidDecoder;

impl BlockDecoder for SolidDecoder {
    fn decode(
        &mut self,
        _frame: &[u8],
        emit: &mut dyn FnMut(&ImageInfo, u32, &McuBlocks),
    ) -> Result<()> {
        let info = ImageInfo { width: 16, height: 16, mcus_per_row: 2, scan: ScanType::H1V1 };
        let mut blocks = McuBlocks::new();
        blocks.g = [250; 256];
        for no in 0..4 {
            emit(&info, no, &blocks);
        }
        Ok(())
    }
}

fn network_config() -> LedConfig {
    LedConfig {
        refresh_rate: 0,
        artnet_width: 16,
        channels: vec![ChannelConfig {
            mode: ChannelMode::Network,
            sx: 16,
            sy: 16,
            ..ChannelConfig::default()
        }],
        ..LedConfig::default()
    }
}

/// Single-fragment RTP/JPEG datagram carrying `data_len` entropy bytes.
fn mjpeg_datagram(seq: u16, ts: u32, data_len: usize) -> Vec<u8> {
    let mut pkt = vec![0x80, 0x80 | 26];
    pkt.extend_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(&ts.to_be_bytes());
    pkt.extend_from_slice(&[0, 0, 0, 1]);
    // Payload header: offset 0, type 0, Q=255, 16x16.
    pkt.extend_from_slice(&[0, 0, 0, 0, 0, 255, 2, 2]);
    // Quantization header: precision 0, 64 table bytes.
    pkt.extend_from_slice(&[0, 0, 0, 64]);
    pkt.extend_from_slice(&[16u8; 64]);
    pkt.extend_from_slice(&vec![0xAB; data_len]);
    pkt
}

fn dmx_datagram(universe: u16, sequence: u8, pixels: &[(u8, u8, u8)]) -> Vec<u8> {
    let mut pkt = Vec::new();
    pkt.extend_from_slice(b"Art-Net\0");
    pkt.extend_from_slice(&0x5000u16.to_le_bytes());
    pkt.extend_from_slice(&[0, 14, sequence, 0]);
    pkt.extend_from_slice(&universe.to_le_bytes());
    let len = (pixels.len() * 3) as u16;
    pkt.extend_from_slice(&len.to_be_bytes());
    for &(r, g, b) in pixels {
        // GRB on the wire.
        pkt.extend_from_slice(&[g, r, b]);
    }
    pkt
}

fn sync_datagram() -> Vec<u8> {
    let mut pkt = Vec::new();
    pkt.extend_from_slice(b"Art-Net\0");
    pkt.extend_from_slice(&0x5200u16.to_le_bytes());
    pkt.extend_from_slice(&[0, 14, 0, 0, 0, 0, 0, 0]);
    pkt
}

async fn wait_for(mut done: impl FnMut() -> bool, what: &str) {
    for _ in 0..300 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

async fn spawn_wall(config: LedConfig) -> (LedWall, Arc<Mutex<OutputLog>>, UdpSocket) {
    init_tracing();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let log = Arc::new(Mutex::new(OutputLog::default()));
    let wall = LedWall::spawn(
        socket,
        config,
        Box::new(SolidDecoder),
        Box::new(RecordingOutput(Arc::clone(&log))),
        Box::new(NoPlaylist),
    );
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.connect(wall.local_addr().unwrap()).await.unwrap();
    (wall, log, sender)
}

#[tokio::test]
async fn mjpeg_frame_lands_on_the_canvas_and_renders() {
    let (wall, log, sender) = spawn_wall(network_config()).await;

    sender.send(&mjpeg_datagram(1, 42, 100)).await.unwrap();

    wait_for(|| wall.stats().mjpeg_good == 1, "frame acceptance").await;
    let canvas = wall.canvas();
    wait_for(
        || {
            canvas
                .with_strip(0, |strip, _| strip.frame().read(0).unwrap() != (0, 0, 0))
                .unwrap()
        },
        "decoded pixels",
    )
    .await;

    // The marker bit triggered a render on top of the initial frame.
    wait_for(|| log.lock().unwrap().sends >= 2, "device send").await;

    // A second trigger flushes the decoded pixels to the device.
    sender.send(&sync_datagram()).await.unwrap();
    wait_for(
        || {
            let log = log.lock().unwrap();
            log.frames.first().is_some_and(|f| f.iter().any(|&b| b != 0))
        },
        "painted device frame",
    )
    .await;
    assert_eq!(log.lock().unwrap().frames[0].len(), 16 * 16 * 3);

    assert_eq!(wall.stats().mjpeg_error, 0);
    wall.shutdown().await;
}

#[tokio::test]
async fn art_net_universe_renders_on_sync() {
    let (wall, log, sender) = spawn_wall(network_config()).await;

    sender.send(&dmx_datagram(0, 1, &[(10, 20, 30), (40, 50, 60)])).await.unwrap();
    sender.send(&sync_datagram()).await.unwrap();

    wait_for(|| wall.stats().artnet_good == 1, "dmx acceptance").await;
    wait_for(|| log.lock().unwrap().sends >= 2, "sync-driven render").await;

    let canvas = wall.canvas();
    canvas.with_strip(0, |strip, _| {
        assert_ne!(strip.frame().read(0).unwrap(), (0, 0, 0));
        assert_ne!(strip.frame().read(1).unwrap(), (0, 0, 0));
        assert_eq!(strip.frame().read(2).unwrap(), (0, 0, 0));
    });
    assert_eq!(wall.stats().rtp_good, 2);
    wall.shutdown().await;
}

#[tokio::test]
async fn config_update_resizes_the_device_buffers() {
    let mut config = network_config();
    config.refresh_rate = 100;
    let (wall, log, _sender) = spawn_wall(config.clone()).await;

    wait_for(|| log.lock().unwrap().configured.contains(&(0, 256)), "initial sizing").await;

    config.channels[0].sx = 8;
    config.channels[0].sy = 8;
    wall.update_config(config);
    wait_for(|| log.lock().unwrap().configured.contains(&(0, 64)), "resized buffers").await;

    wall.shutdown().await;
}

#[tokio::test]
async fn lost_fragments_count_against_the_stream() {
    let (wall, log, sender) = spawn_wall(network_config()).await;

    // Fragment 0 of a frame, then a fragment of the same frame with a
    // bogus offset.
    let mut first = mjpeg_datagram(1, 7, 100);
    first[1] = 26; // clear the marker, more fragments expected
    sender.send(&first).await.unwrap();

    let mut gap = vec![0x80, 0x80 | 26];
    gap.extend_from_slice(&2u16.to_be_bytes());
    gap.extend_from_slice(&7u32.to_be_bytes());
    gap.extend_from_slice(&[0, 0, 0, 1]);
    gap.extend_from_slice(&[0, 0, 0, 99, 0, 255, 2, 2]);
    gap.extend_from_slice(&[0xAB; 30]);
    sender.send(&gap).await.unwrap();

    wait_for(|| wall.stats().mjpeg_loss == 1, "loss accounting").await;
    assert_eq!(wall.stats().mjpeg_good, 0);
    assert_eq!(wall.stats().rtp_error, 1);

    // The dropped fragment carried the marker, so the renderer still ran
    // a network-driven frame on top of the initial one.
    wait_for(|| log.lock().unwrap().sends >= 2, "marker-driven render").await;
    wall.shutdown().await;
}
