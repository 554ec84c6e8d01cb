//! Presentation boundary: the sink capability plus the loop that drives
//! snapshotting, compositing, and presenting at a fixed cadence.

mod controller;
mod sink;

#[cfg(all(feature = "gst", target_os = "linux"))]
mod window;

#[cfg(test)]
mod tests;

pub use controller::{DisplayLoop, LoopState};
pub use sink::{HeadlessSink, PresentationSink};

#[cfg(all(feature = "gst", target_os = "linux"))]
pub use window::GstWindowSink;
