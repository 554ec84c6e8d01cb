use crate::slot::StreamHealth;
use crate::supervisor::StreamSupervisor;
use crate::frame::FrameData;
use std::time::{Duration, Instant};
use tracing::info;

/// Per-stream view handed to the compositor: identity, best-known frame,
/// health, and a staleness flag computed against the shared threshold.
#[derive(Debug, Clone)]
pub struct StreamSnapshot {
    pub label: String,
    pub frame: Option<FrameData>,
    pub health: StreamHealth,
    pub stale: bool,
}

/// Owns the configured set of stream supervisors as a unit.
///
/// Streams are independent by design: `snapshot_all` relies on each slot's
/// own atomicity and provides no cross-slot transaction. Order is stable and
/// matches configuration order, so compositing is deterministic.
pub struct StreamGroup {
    supervisors: Vec<StreamSupervisor>,
    stale_threshold: Duration,
}

impl StreamGroup {
    pub fn new(supervisors: Vec<StreamSupervisor>, stale_threshold: Duration) -> Self {
        Self {
            supervisors,
            stale_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    /// Start every member supervisor.
    pub async fn start(&self) {
        info!(streams = self.supervisors.len(), "Starting stream group");
        for supervisor in &self.supervisors {
            supervisor.start().await;
        }
    }

    /// Stop every member supervisor in turn. Waits up to each member's grace
    /// period, so the total wait is bounded by the sum of the grace periods.
    pub async fn stop(&self) {
        info!(streams = self.supervisors.len(), "Stopping stream group");
        for supervisor in &self.supervisors {
            supervisor.stop().await;
        }
    }

    /// One consistent per-stream read for this tick, in configured order.
    pub fn snapshot_all(&self) -> Vec<StreamSnapshot> {
        let now = Instant::now();
        self.supervisors
            .iter()
            .map(|supervisor| {
                let snap = supervisor.snapshot();
                StreamSnapshot {
                    label: supervisor.identity().label.clone(),
                    stale: snap.is_stale(now, self.stale_threshold),
                    frame: snap.frame,
                    health: snap.health,
                }
            })
            .collect()
    }
}
