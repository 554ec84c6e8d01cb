//! Synthetic frame source used by the binary when no media backend feature
//! is enabled, and by the end-to-end tests to script connection failures.

use crate::error::SourceError;
use crate::frame::FrameData;
use crate::source::{FrameReader, FrameSource};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Every open succeeds and the reader yields frames forever
    Live,
    /// Every open fails
    NeverConnects,
    /// The first open succeeds and yields `frames` frames, then reads fail;
    /// every later open fails
    LiveThenDead { frames: u64 },
}

/// Scriptable synthetic frame source producing solid-tint RGB frames with a
/// moving horizontal band, so motion is visible on screen.
pub struct MockFrameSource {
    behavior: Behavior,
    width: u32,
    height: u32,
    interval: Duration,
    tint: [u8; 3],
    opens: AtomicU32,
}

impl MockFrameSource {
    pub fn live(interval: Duration, width: u32, height: u32, tint: [u8; 3]) -> Self {
        Self::with_behavior(Behavior::Live, interval, width, height, tint)
    }

    pub fn never_connects() -> Self {
        Self::with_behavior(
            Behavior::NeverConnects,
            Duration::from_millis(10),
            0,
            0,
            [0, 0, 0],
        )
    }

    pub fn live_then_dead(
        frames: u64,
        interval: Duration,
        width: u32,
        height: u32,
        tint: [u8; 3],
    ) -> Self {
        Self::with_behavior(Behavior::LiveThenDead { frames }, interval, width, height, tint)
    }

    fn with_behavior(
        behavior: Behavior,
        interval: Duration,
        width: u32,
        height: u32,
        tint: [u8; 3],
    ) -> Self {
        Self {
            behavior,
            width,
            height,
            interval,
            tint,
            opens: AtomicU32::new(0),
        }
    }

    /// How many times `open` has been attempted, successful or not.
    pub fn open_attempts(&self) -> u32 {
        self.opens.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn open(&self, uri: &str) -> Result<Box<dyn FrameReader>, SourceError> {
        let attempt = self.opens.fetch_add(1, Ordering::Relaxed);

        match self.behavior {
            Behavior::Live => {}
            Behavior::NeverConnects => {
                return Err(SourceError::connect(format!("{}: connection refused", uri)));
            }
            Behavior::LiveThenDead { .. } if attempt > 0 => {
                return Err(SourceError::connect(format!("{}: host unreachable", uri)));
            }
            Behavior::LiveThenDead { .. } => {}
        }

        debug!("Mock source opened for {}", uri);

        let remaining = match self.behavior {
            Behavior::LiveThenDead { frames } => Some(frames),
            _ => None,
        };

        Ok(Box::new(MockReader {
            remaining,
            interval: self.interval,
            width: self.width,
            height: self.height,
            tint: self.tint,
            next_id: 0,
        }))
    }
}

struct MockReader {
    remaining: Option<u64>,
    interval: Duration,
    width: u32,
    height: u32,
    tint: [u8; 3],
    next_id: u64,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn read_next(&mut self) -> Result<FrameData, SourceError> {
        if let Some(remaining) = self.remaining {
            if remaining == 0 {
                return Err(SourceError::read("simulated mid-session failure"));
            }
            self.remaining = Some(remaining - 1);
        }

        sleep(self.interval).await;

        let id = self.next_id;
        self.next_id += 1;

        Ok(synthetic_frame(id, self.width, self.height, self.tint))
    }
}

/// Solid-tint frame with one brighter row that scrolls with the frame id.
fn synthetic_frame(id: u64, width: u32, height: u32, tint: [u8; 3]) -> FrameData {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    let band = (id % height.max(1) as u64) as u32;
    for y in 0..height {
        let px = if y == band {
            [
                tint[0].saturating_add(60),
                tint[1].saturating_add(60),
                tint[2].saturating_add(60),
            ]
        } else {
            tint
        };
        for _ in 0..width {
            data.extend_from_slice(&px);
        }
    }
    FrameData::new(id, SystemTime::now(), data, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_source_yields_frames() {
        let source = MockFrameSource::live(Duration::from_millis(1), 8, 6, [10, 20, 30]);
        let mut reader = source.open("mock://a").await.unwrap();
        let first = reader.read_next().await.unwrap();
        let second = reader.read_next().await.unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
        assert_eq!(first.width, 8);
        assert_eq!(first.height, 6);
        assert!(first.validate_size());
    }

    #[tokio::test]
    async fn test_never_connects() {
        let source = MockFrameSource::never_connects();
        assert!(matches!(
            source.open("mock://b").await,
            Err(SourceError::Connect { .. })
        ));
        assert_eq!(source.open_attempts(), 1);
    }

    #[tokio::test]
    async fn test_live_then_dead() {
        let source = MockFrameSource::live_then_dead(2, Duration::from_millis(1), 4, 4, [0, 0, 0]);
        let mut reader = source.open("mock://c").await.unwrap();
        assert!(reader.read_next().await.is_ok());
        assert!(reader.read_next().await.is_ok());
        assert!(matches!(
            reader.read_next().await,
            Err(SourceError::Read { .. })
        ));
        // Reopening after the session died fails
        assert!(matches!(
            source.open("mock://c").await,
            Err(SourceError::Connect { .. })
        ));
    }
}
