//! Frame source capability: the boundary to the platform's media layer.
//!
//! A [`FrameSource`] opens a URI and yields a [`FrameReader`]; the reader
//! yields successive raw RGB frames until a read error or end of stream.
//! Whatever resources a reader holds are released when it is dropped.

use crate::error::SourceError;
use crate::frame::FrameData;
use async_trait::async_trait;

pub mod mock;

#[cfg(all(feature = "gst", target_os = "linux"))]
pub mod gst;

pub use mock::MockFrameSource;

#[cfg(all(feature = "gst", target_os = "linux"))]
pub use gst::GstFrameSource;

/// Capability to open a stream URI. Implementations must be cheap to share
/// across supervisor tasks.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn open(&self, uri: &str) -> Result<Box<dyn FrameReader>, SourceError>;
}

/// One open stream session. Dropping the reader closes the session.
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for and return the next frame.
    async fn read_next(&mut self) -> Result<FrameData, SourceError>;
}
