//! End-to-end scenarios over scripted mock sources and a recording sink.

use crate::compositor::Compositor;
use crate::config::{DisplayConfig, RetryConfig};
use crate::display::{DisplayLoop, LoopState, PresentationSink};
use crate::error::{CamviewError, Result};
use crate::group::StreamGroup;
use crate::slot::StreamHealth;
use crate::source::MockFrameSource;
use crate::supervisor::{StreamIdentity, StreamSupervisor};
use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Sink that records every presented frame and requests exit after a fixed
/// number of ticks.
struct RecordingSink {
    size: Option<(u32, u32)>,
    frames: Vec<RgbImage>,
    max_ticks: usize,
}

impl RecordingSink {
    fn new(size: Option<(u32, u32)>, max_ticks: usize) -> Self {
        Self {
            size,
            frames: Vec::new(),
            max_ticks,
        }
    }

    fn last_frame(&self) -> &RgbImage {
        self.frames.last().expect("no frame presented")
    }
}

#[async_trait]
impl PresentationSink for RecordingSink {
    fn surface_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn present(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    async fn poll_exit(&mut self, timeout: Duration) -> bool {
        sleep(timeout).await;
        self.frames.len() >= self.max_ticks
    }
}

/// Sink whose surface fails after a fixed number of successful presents.
struct FailingSink {
    presents: usize,
    fail_after: usize,
}

#[async_trait]
impl PresentationSink for FailingSink {
    fn surface_size(&self) -> Option<(u32, u32)> {
        Some((320, 240))
    }

    fn present(&mut self, _frame: &RgbImage) -> Result<()> {
        if self.presents >= self.fail_after {
            return Err(CamviewError::display("surface lost"));
        }
        self.presents += 1;
        Ok(())
    }

    async fn poll_exit(&mut self, timeout: Duration) -> bool {
        sleep(timeout).await;
        false
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        floor_seconds: 0.005,
        ceiling_seconds: 0.02,
        growth_factor: 1.6,
    }
}

fn supervisor(label: &str, source: MockFrameSource) -> StreamSupervisor {
    StreamSupervisor::new(
        StreamIdentity {
            uri: format!("mock://{}", label),
            label: label.to_string(),
        },
        Arc::new(source),
        fast_retry(),
    )
}

fn display_config(tick_ms: u64) -> DisplayConfig {
    DisplayConfig {
        tick_interval_ms: tick_ms,
        ..DisplayConfig::default()
    }
}

/// Both stream opens fail forever: the composite output is two labeled
/// placeholder tiles at exactly the requested surface size.
#[tokio::test]
async fn test_all_streams_dead_renders_placeholders() {
    let group = StreamGroup::new(
        vec![
            supervisor("FRONT", MockFrameSource::never_connects()),
            supervisor("BACK", MockFrameSource::never_connects()),
        ],
        Duration::from_secs(2),
    );

    let sink = RecordingSink::new(Some((1280, 720)), 3);
    let mut display = DisplayLoop::new(group, Compositor::new(None, 24.0), sink, &display_config(20));

    display.run(CancellationToken::new()).await.unwrap();
    assert_eq!(display.state(), LoopState::Stopped);

    let last = display.sink().last_frame();
    assert_eq!(last.dimensions(), (1280, 720));

    // Mosaic is 2x640 placeholders at 540 tall, letterboxed 1:1 into
    // 1280x720 with 90px bars: the gray placeholder headers land at y=90
    assert_eq!(last.get_pixel(5, 95).0, [64, 64, 64]);
    assert_eq!(last.get_pixel(645, 95).0, [64, 64, 64]);
    // Top gutter stays black
    assert_eq!(last.get_pixel(640, 5).0, [0, 0, 0]);

    // Neither stream ever produced a frame
    for snap in display.group().snapshot_all() {
        assert!(snap.frame.is_none());
        assert!(snap.stale);
    }
}

/// One live stream beside one that never connects: the live tile shows frame
/// content and a Live health reading; the other stays a placeholder.
#[tokio::test]
async fn test_live_tile_beside_placeholder() {
    let group = StreamGroup::new(
        vec![
            supervisor(
                "FRONT",
                MockFrameSource::live(Duration::from_millis(10), 64, 48, [200, 30, 40]),
            ),
            supervisor("BACK", MockFrameSource::never_connects()),
        ],
        Duration::from_secs(2),
    );

    let sink = RecordingSink::new(Some((1280, 720)), 10);
    let mut display = DisplayLoop::new(group, Compositor::new(None, 24.0), sink, &display_config(30));

    display.run(CancellationToken::new()).await.unwrap();

    let snaps = display.group().snapshot_all();
    assert_eq!(snaps[0].health, StreamHealth::Live);
    assert!(snaps[0].frame.is_some());
    assert!(!snaps[0].stale);
    assert!(snaps[1].frame.is_none());
    assert!(snaps[1].stale);

    let last = display.sink().last_frame();
    assert_eq!(last.dimensions(), (1280, 720));

    // The live tile occupies the left of the mosaic; sample inside its body
    // and expect the frame tint to dominate
    let px = last.get_pixel(339, 388).0;
    assert!(px[0] > 100, "expected red-dominant live tile, got {:?}", px);
    assert!(px[2] < 120, "expected red-dominant live tile, got {:?}", px);
}

/// A stream goes live, then its session dies: its tile keeps showing the
/// last good frame (not a placeholder) and is classified stale once the
/// threshold passes.
#[tokio::test]
async fn test_dropped_stream_freezes_last_frame() {
    let group = StreamGroup::new(
        vec![supervisor(
            "FRONT",
            MockFrameSource::live_then_dead(3, Duration::from_millis(10), 64, 48, [90, 0, 0]),
        )],
        // Short threshold so the frozen state is reached within the test
        Duration::from_millis(100),
    );

    let sink = RecordingSink::new(Some((1280, 720)), 10);
    let mut display = DisplayLoop::new(group, Compositor::new(None, 24.0), sink, &display_config(40));

    display.run(CancellationToken::new()).await.unwrap();

    let snaps = display.group().snapshot_all();
    assert!(snaps[0].frame.is_some(), "last good frame must be retained");
    assert_ne!(snaps[0].health, StreamHealth::Live);
    assert!(snaps[0].stale);

    // The final composite still shows the retained frame, not a placeholder:
    // a single 720x540 tile letterboxed into 1280x720 fills rows 0..720
    // between x=160 and x=1120
    let last = display.sink().last_frame();
    let px = last.get_pixel(640, 400).0;
    assert!(px[0] > 40, "expected retained frame body, got {:?}", px);
    // Placeholder headers are gray; this tile's header must be black
    let header = last.get_pixel(200, 10).0;
    assert_eq!(header, [0, 0, 0]);
}

/// An unrealized surface falls back to the documented default size instead
/// of failing.
#[tokio::test]
async fn test_unknown_surface_uses_fallback_size() {
    let group = StreamGroup::new(
        vec![supervisor("FRONT", MockFrameSource::never_connects())],
        Duration::from_secs(2),
    );

    let config = DisplayConfig {
        fallback_resolution: (640, 360),
        ..display_config(10)
    };
    let sink = RecordingSink::new(None, 2);
    let mut display = DisplayLoop::new(group, Compositor::new(None, 24.0), sink, &config);

    display.run(CancellationToken::new()).await.unwrap();
    assert_eq!(display.sink().last_frame().dimensions(), (640, 360));
}

/// A present failure surfaces as an error, but only after the supervisors
/// have been stopped; nothing keeps reconnecting behind the caller's back.
#[tokio::test]
async fn test_present_failure_still_stops_supervisors() {
    let source = Arc::new(MockFrameSource::never_connects());
    let group = StreamGroup::new(
        vec![StreamSupervisor::new(
            StreamIdentity {
                uri: "mock://front".to_string(),
                label: "FRONT".to_string(),
            },
            source.clone(),
            fast_retry(),
        )],
        Duration::from_secs(2),
    );

    let sink = FailingSink {
        presents: 0,
        fail_after: 2,
    };
    let mut display = DisplayLoop::new(group, Compositor::new(None, 24.0), sink, &display_config(10));

    let result = display.run(CancellationToken::new()).await;
    assert!(result.is_err());
    assert_eq!(display.state(), LoopState::Stopped);

    // The supervisor no longer retries once run() has returned
    let attempts = source.open_attempts();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(source.open_attempts(), attempts);
}

/// External shutdown signal stops the loop and its supervisors.
#[tokio::test]
async fn test_shutdown_signal_stops_loop() {
    let group = StreamGroup::new(
        vec![supervisor("FRONT", MockFrameSource::never_connects())],
        Duration::from_secs(2),
    );

    // Exit never requested by the sink; only the token can stop the loop
    let sink = RecordingSink::new(Some((320, 240)), usize::MAX);
    let mut display = DisplayLoop::new(group, Compositor::new(None, 24.0), sink, &display_config(10));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(60)).await;
        trigger.cancel();
    });

    display.run(shutdown).await.unwrap();
    assert_eq!(display.state(), LoopState::Stopped);
    assert!(!display.sink().frames.is_empty());
}
