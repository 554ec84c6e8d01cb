//! GStreamer-backed live frame source: `uridecodebin` handles demux and
//! decoding, an `appsink` hands us raw RGB frames.

use crate::error::SourceError;
use crate::frame::FrameData;
use crate::source::{FrameReader, FrameSource};
use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;

/// A session that stops delivering samples for this long is treated as a
/// read failure, triggering reconnect with backoff.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GstFrameSource;

impl GstFrameSource {
    pub fn new() -> Result<Self, SourceError> {
        gstreamer::init()
            .map_err(|e| SourceError::connect(format!("Failed to initialize GStreamer: {}", e)))?;
        Ok(Self)
    }
}

#[async_trait]
impl FrameSource for GstFrameSource {
    async fn open(&self, uri: &str) -> Result<Box<dyn FrameReader>, SourceError> {
        let pipeline_desc = format!(
            "uridecodebin uri={} ! videoconvert ! video/x-raw,format=RGB ! \
             queue max-size-buffers=4 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=4 drop=true emit-signals=false",
            uri
        );

        debug!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| SourceError::connect(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| SourceError::connect("Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| SourceError::connect("Failed to get appsink"))?
            .downcast::<AppSink>()
            .map_err(|_| SourceError::connect("Failed to downcast to AppSink"))?;

        let (tx, rx) = mpsc::unbounded_channel();

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let _ = tx.send(sample);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| SourceError::connect(format!("Failed to start pipeline: {}", e)))?;

        info!("GStreamer pipeline playing for {}", uri);

        Ok(Box::new(GstReader {
            pipeline,
            rx,
            frame_counter: 0,
        }))
    }
}

struct GstReader {
    pipeline: Pipeline,
    rx: mpsc::UnboundedReceiver<gstreamer::Sample>,
    frame_counter: u64,
}

#[async_trait]
impl FrameReader for GstReader {
    async fn read_next(&mut self) -> Result<FrameData, SourceError> {
        let sample = match timeout(READ_TIMEOUT, self.rx.recv()).await {
            Ok(Some(sample)) => sample,
            Ok(None) => return Err(SourceError::EndOfStream),
            Err(_) => {
                return Err(SourceError::read(format!(
                    "no frame received within {:?}",
                    READ_TIMEOUT
                )))
            }
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| SourceError::read("No buffer in sample"))?;

        let caps = sample
            .caps()
            .ok_or_else(|| SourceError::read("No caps in sample"))?;

        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| SourceError::read(format!("Failed to get video info: {}", e)))?;

        let width = video_info.width();
        let height = video_info.height();

        let map = buffer
            .map_readable()
            .map_err(|e| SourceError::read(format!("Failed to map buffer: {}", e)))?;

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        trace!(
            "Read RGB frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            map.len()
        );

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            map.as_slice().to_vec(),
            width,
            height,
        ))
    }
}

impl Drop for GstReader {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!("GStreamer pipeline released");
    }
}
