use crate::error::Result;
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Where composited frames go. A window, a framebuffer, or a test recorder.
#[async_trait]
pub trait PresentationSink: Send {
    /// Current surface size, or `None` while the surface is not realized.
    /// Re-queried by the display loop on every tick.
    fn surface_size(&self) -> Option<(u32, u32)>;

    /// Present one composited frame.
    fn present(&mut self, frame: &RgbImage) -> Result<()>;

    /// Wait up to `timeout` and report whether an exit was requested. This
    /// bounds the display loop's tick cadence.
    async fn poll_exit(&mut self, timeout: Duration) -> bool;
}

/// Sink used when no windowing backend is enabled: frames are acknowledged
/// at trace level and `q`/`Esc` on the terminal requests exit.
pub struct HeadlessSink {
    size: Option<(u32, u32)>,
    exit_requested: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
    presented: u64,
}

impl HeadlessSink {
    pub fn new(size: Option<(u32, u32)>) -> Self {
        Self {
            size,
            exit_requested: Arc::new(AtomicBool::new(false)),
            cancellation_token: CancellationToken::new(),
            presented: 0,
        }
    }

    /// Start the blocking keyboard listener. Must be called from within a
    /// tokio runtime; without it only an interrupt signal can request exit.
    pub fn spawn_exit_listener(&self) {
        info!("Starting keyboard exit listener - press q or Esc to quit");

        let exit_requested = Arc::clone(&self.exit_requested);
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                warn!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard exit listener stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if key_event.kind == KeyEventKind::Press {
                                match key_event.code {
                                    KeyCode::Char('q') | KeyCode::Esc => {
                                        info!("Quit key pressed - requesting shutdown");
                                        exit_requested.store(true, Ordering::Relaxed);
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!("Keyboard polling error: {}", e);
                        break;
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                warn!("Failed to disable raw mode: {}", e);
            }
        });
    }
}

#[async_trait]
impl PresentationSink for HeadlessSink {
    fn surface_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn present(&mut self, frame: &RgbImage) -> Result<()> {
        self.presented += 1;
        trace!(
            width = frame.width(),
            height = frame.height(),
            presented = self.presented,
            "Presented frame (headless)"
        );
        Ok(())
    }

    async fn poll_exit(&mut self, timeout: Duration) -> bool {
        sleep(timeout).await;
        self.exit_requested.load(Ordering::Relaxed)
    }
}

impl Drop for HeadlessSink {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
        let _ = disable_raw_mode();
    }
}
