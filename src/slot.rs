use crate::frame::FrameData;
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Health of one supervised stream, as last reported by its supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamHealth {
    /// Supervisor not started yet
    Idle,
    /// Opening the source, or waiting out a backoff delay before the next attempt
    Connecting,
    /// Source open and delivering frames
    Live,
    /// A read failed or the stream ended; a reconnect attempt follows
    Dropped,
}

impl StreamHealth {
    /// Status text rendered into the tile header
    pub fn status_text(&self) -> &'static str {
        match self {
            StreamHealth::Idle => "IDLE",
            StreamHealth::Connecting => "CONNECTING...",
            StreamHealth::Live => "LIVE",
            StreamHealth::Dropped => "DROPPED",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, StreamHealth::Live)
    }
}

/// Copy-out view of a slot at one instant.
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub frame: Option<FrameData>,
    pub health: StreamHealth,
    pub last_updated_at: Option<Instant>,
}

impl SlotSnapshot {
    /// A stream that has never produced a frame is always stale; otherwise it
    /// is stale once the time since its last update exceeds `threshold`.
    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        match self.last_updated_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) > threshold,
        }
    }
}

struct SlotState {
    frame: Option<FrameData>,
    health: StreamHealth,
    last_updated_at: Option<Instant>,
}

/// Single-slot latest-frame cell for one stream.
///
/// Written exclusively by the stream's supervisor task, read concurrently by
/// the display loop. A publish replaces frame and timestamp together under
/// one short write lock, so a reader always observes an internally consistent
/// `(frame, timestamp)` pair and timestamps are monotonically non-decreasing.
/// Readers copy out and release immediately; the frame's pixel buffer is
/// reference-counted, so neither side holds the lock for the duration of
/// decoding or rendering.
pub struct LatestFrameSlot {
    state: RwLock<SlotState>,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SlotState {
                frame: None,
                health: StreamHealth::Idle,
                last_updated_at: None,
            }),
        }
    }

    /// Publish a freshly read frame. Also marks the stream `Live`.
    pub fn publish(&self, frame: FrameData) {
        let now = Instant::now();
        let mut state = self.state.write();
        state.frame = Some(frame);
        state.health = StreamHealth::Live;
        // Instant is monotonic, but keep the invariant explicit
        state.last_updated_at = match state.last_updated_at {
            Some(prev) if prev > now => Some(prev),
            _ => Some(now),
        };
    }

    /// Update health without touching the last published frame, so a viewer
    /// reading during a reconnect (or shutdown) still sees the last good
    /// frame rather than a blanked one.
    pub fn set_health(&self, health: StreamHealth) {
        self.state.write().health = health;
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let state = self.state.read();
        SlotSnapshot {
            frame: state.frame.clone(),
            health: state.health,
            last_updated_at: state.last_updated_at,
        }
    }
}

impl Default for LatestFrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
