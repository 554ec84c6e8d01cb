pub mod compositor;
pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod group;
pub mod slot;
pub mod source;
pub mod supervisor;

pub use compositor::{Compositor, FALLBACK_SURFACE, HEADER_HEIGHT, PLACEHOLDER_WIDTH};
pub use config::{CamviewConfig, DisplayConfig, RetryConfig, StreamEntry};
pub use display::{DisplayLoop, HeadlessSink, LoopState, PresentationSink};
pub use error::{CamviewError, Result, SourceError};
pub use frame::FrameData;
pub use group::{StreamGroup, StreamSnapshot};
pub use slot::{LatestFrameSlot, SlotSnapshot, StreamHealth};
pub use source::{FrameReader, FrameSource, MockFrameSource};
pub use supervisor::{RetryState, StreamIdentity, StreamSupervisor, STOP_GRACE};

#[cfg(all(feature = "gst", target_os = "linux"))]
pub use display::GstWindowSink;

#[cfg(all(feature = "gst", target_os = "linux"))]
pub use source::GstFrameSource;
