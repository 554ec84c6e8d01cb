use crate::config::RetryConfig;
use crate::slot::{LatestFrameSlot, SlotSnapshot, StreamHealth};
use crate::source::FrameSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// How long `stop()` waits for the supervision task before giving up and
/// returning anyway.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Immutable identity of one supervised stream.
#[derive(Debug, Clone)]
pub struct StreamIdentity {
    pub uri: String,
    pub label: String,
}

/// Backoff state shared by open failures and read failures of one stream.
///
/// `next_delay` returns the current delay and then grows it by the configured
/// factor up to the ceiling, so consecutive failures wait
/// `floor, floor*g, floor*g^2, ...` capped. `reset` restores the floor and is
/// called on every successful open.
#[derive(Debug)]
pub struct RetryState {
    current: Duration,
    config: RetryConfig,
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current: config.floor(),
            config,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.mul_f64(self.config.growth_factor);
        self.current = grown.min(self.config.ceiling());
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.floor();
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

/// Keeps exactly one stream alive indefinitely: open, read, detect failure,
/// back off, reconnect, forever. The freshest frame and the stream's health
/// are published into a [`LatestFrameSlot`] owned by this supervisor; no
/// error ever propagates past it.
pub struct StreamSupervisor {
    identity: StreamIdentity,
    slot: Arc<LatestFrameSlot>,
    source: Arc<dyn FrameSource>,
    retry: RetryConfig,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamSupervisor {
    pub fn new(identity: StreamIdentity, source: Arc<dyn FrameSource>, retry: RetryConfig) -> Self {
        Self {
            identity,
            slot: Arc::new(LatestFrameSlot::new()),
            source,
            retry,
            cancel: CancellationToken::new(),
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    pub fn slot(&self) -> Arc<LatestFrameSlot> {
        Arc::clone(&self.slot)
    }

    /// Copy-out view of the stream's latest frame and health. Never blocks
    /// the supervisor's write path beyond the slot's short critical section.
    pub fn snapshot(&self) -> SlotSnapshot {
        self.slot.snapshot()
    }

    /// Begin the supervision loop on its own task and return immediately.
    ///
    /// Precondition: called at most once per supervisor. A second call is a
    /// programming error; it is logged and ignored.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!(
                stream = %self.identity.label,
                "Supervisor already started; ignoring duplicate start"
            );
            return;
        }

        info!(stream = %self.identity.label, uri = %self.identity.uri, "Starting stream supervisor");

        let identity = self.identity.clone();
        let slot = Arc::clone(&self.slot);
        let source = Arc::clone(&self.source);
        let retry = RetryState::new(self.retry.clone());
        let cancel = self.cancel.clone();

        *task = Some(tokio::spawn(async move {
            run_supervision_loop(identity, slot, source, retry, cancel).await;
        }));
    }

    /// Signal the loop to terminate and wait up to [`STOP_GRACE`] for it to
    /// exit. Returns regardless once the grace period elapses, so callers
    /// stay responsive during shutdown.
    pub async fn stop(&self) {
        info!(stream = %self.identity.label, "Stopping stream supervisor");
        self.cancel.cancel();

        if let Some(task) = self.task.lock().await.take() {
            match timeout(STOP_GRACE, task).await {
                Ok(Ok(())) => {
                    debug!(stream = %self.identity.label, "Supervisor task exited cleanly")
                }
                Ok(Err(e)) => {
                    error!(stream = %self.identity.label, "Supervisor task failed: {}", e)
                }
                Err(_) => warn!(
                    stream = %self.identity.label,
                    "Supervisor task did not exit within {:?}; proceeding", STOP_GRACE
                ),
            }
        }
    }
}

/// The reconnect loop. Every failure mode (connect, auth, resolve, read,
/// end-of-stream) degrades to "retry with backoff"; the only externally
/// visible effects are the slot's health and frame staleness. A stop request
/// is observed at every suspension point (open, read, backoff sleep) and
/// leaves the last published frame in place.
async fn run_supervision_loop(
    identity: StreamIdentity,
    slot: Arc<LatestFrameSlot>,
    source: Arc<dyn FrameSource>,
    mut retry: RetryState,
    cancel: CancellationToken,
) {
    debug!(stream = %identity.label, "Supervision loop running");

    'supervise: loop {
        slot.set_health(StreamHealth::Connecting);

        let opened = tokio::select! {
            _ = cancel.cancelled() => break 'supervise,
            result = source.open(&identity.uri) => result,
        };

        match opened {
            Ok(mut reader) => {
                info!(stream = %identity.label, "Stream connected");
                slot.set_health(StreamHealth::Live);
                retry.reset();

                loop {
                    let read = tokio::select! {
                        _ = cancel.cancelled() => break 'supervise,
                        result = reader.read_next() => result,
                    };

                    match read {
                        Ok(frame) => {
                            trace!(
                                stream = %identity.label,
                                frame_id = frame.id,
                                width = frame.width,
                                height = frame.height,
                                "Frame published"
                            );
                            slot.publish(frame);
                        }
                        Err(e) => {
                            warn!(stream = %identity.label, "Stream dropped: {}", e);
                            slot.set_health(StreamHealth::Dropped);
                            // Reader dropped here, releasing the session
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(stream = %identity.label, "Failed to open stream: {}", e);
            }
        }

        // One backoff counter covers open failures and read failures alike:
        // a first-time drop retries after the floor delay, consecutive
        // failures grow it toward the ceiling.
        let delay = retry.next_delay();
        debug!(
            stream = %identity.label,
            delay_ms = delay.as_millis() as u64,
            "Retrying after backoff"
        );
        tokio::select! {
            _ = cancel.cancelled() => break 'supervise,
            _ = sleep(delay) => {}
        }
    }

    debug!(stream = %identity.label, "Supervision loop stopped");
}
