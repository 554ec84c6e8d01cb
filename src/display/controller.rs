use crate::compositor::Compositor;
use crate::config::DisplayConfig;
use crate::display::sink::PresentationSink;
use crate::error::Result;
use crate::group::StreamGroup;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// Drives the render cadence: on every tick it re-queries the surface size,
/// snapshots all stream slots, composites the mosaic, presents it, and polls
/// the sink for an exit request. Nothing from inside a stream's lifecycle
/// reaches this loop as an error; per-stream failures only show up as health
/// text and staleness markers in the composited output.
pub struct DisplayLoop<S: PresentationSink> {
    group: StreamGroup,
    compositor: Compositor,
    sink: S,
    tile_height: u32,
    fallback_size: (u32, u32),
    tick_interval: Duration,
    state: LoopState,
}

impl<S: PresentationSink> DisplayLoop<S> {
    pub fn new(group: StreamGroup, compositor: Compositor, sink: S, config: &DisplayConfig) -> Self {
        Self {
            group,
            compositor,
            sink,
            tile_height: config.tile_height,
            fallback_size: config.fallback_resolution,
            tick_interval: config.tick_interval(),
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn group(&self) -> &StreamGroup {
        &self.group
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until the sink requests exit, `shutdown` is cancelled, or the
    /// sink fails to present, then stop every supervisor and return. The
    /// surface size is re-read every tick so resizes take effect on the
    /// next frame.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        self.group.start().await;
        info!(streams = self.group.len(), "Display loop running");

        let mut present_error = None;
        while self.state == LoopState::Running {
            let (width, height) = match self.sink.surface_size() {
                Some(size) => size,
                None => {
                    // Surface not realized yet; render at the fallback size
                    // rather than failing for lack of geometry
                    debug!(
                        "Surface size unavailable; using fallback {}x{}",
                        self.fallback_size.0, self.fallback_size.1
                    );
                    self.fallback_size
                }
            };

            let snapshots = self.group.snapshot_all();
            let mosaic = self.compositor.tile_and_annotate_all(&snapshots, self.tile_height);
            let output = Compositor::letterbox_fit(&mosaic, width, height);
            if let Err(e) = self.sink.present(&output) {
                // The supervisors still get a clean stop before the error
                // is surfaced to the caller
                warn!("Presentation failed: {}", e);
                present_error = Some(e);
                self.state = LoopState::Stopping;
                break;
            }

            let exit = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    true
                }
                requested = self.sink.poll_exit(self.tick_interval) => requested,
            };
            if exit {
                self.state = LoopState::Stopping;
            }
        }

        info!("Display loop stopping; shutting down stream supervisors");
        self.group.stop().await;
        self.state = LoopState::Stopped;
        info!("Display loop stopped");

        match present_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
