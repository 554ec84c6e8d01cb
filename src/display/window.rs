//! GStreamer window sink: composited frames are pushed through an `appsrc`
//! into `autovideosink`.

use crate::display::sink::PresentationSink;
use crate::error::{CamviewError, Result};
use async_trait::async_trait;
use image::RgbImage;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, trace};

use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSrc;
use gstreamer_video::{VideoFormat, VideoInfo};

pub struct GstWindowSink {
    pipeline: Pipeline,
    appsrc: AppSrc,
    caps_dims: Option<(u32, u32)>,
}

impl GstWindowSink {
    pub fn new() -> Result<Self> {
        gstreamer::init().map_err(|e| {
            CamviewError::display(format!("Failed to initialize GStreamer: {}", e))
        })?;

        let pipeline_desc =
            "appsrc name=src is-live=true format=time ! videoconvert ! autovideosink sync=false";

        info!("Creating GStreamer window pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(pipeline_desc)
            .map_err(|e| CamviewError::display(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| CamviewError::display("Failed to downcast to Pipeline"))?;

        let appsrc = pipeline
            .by_name("src")
            .ok_or_else(|| CamviewError::display("Failed to get appsrc element"))?
            .downcast::<AppSrc>()
            .map_err(|_| CamviewError::display("Failed to downcast to AppSrc"))?;

        appsrc.set_property("is-live", true);
        appsrc.set_property("block", false);
        appsrc.set_property("do-timestamp", true);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CamviewError::display(format!("Failed to start pipeline: {}", e)))?;

        Ok(Self {
            pipeline,
            appsrc,
            caps_dims: None,
        })
    }

    fn update_caps(&mut self, width: u32, height: u32) -> Result<()> {
        let info = VideoInfo::builder(VideoFormat::Rgb, width, height)
            .fps(gstreamer::Fraction::new(30, 1))
            .build()
            .map_err(|e| CamviewError::display(format!("Failed to build video info: {}", e)))?;
        let caps = info
            .to_caps()
            .map_err(|e| CamviewError::display(format!("Failed to build caps: {}", e)))?;
        self.appsrc.set_caps(Some(&caps));
        self.caps_dims = Some((width, height));
        debug!("Window sink caps set to {}x{}", width, height);
        Ok(())
    }
}

#[async_trait]
impl PresentationSink for GstWindowSink {
    /// `autovideosink` does not report its window geometry here, so the
    /// display loop renders at the configured fallback size.
    fn surface_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn present(&mut self, frame: &RgbImage) -> Result<()> {
        let dims = frame.dimensions();
        if self.caps_dims != Some(dims) {
            self.update_caps(dims.0, dims.1)?;
        }

        let buffer = gstreamer::Buffer::from_mut_slice(frame.as_raw().clone());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| CamviewError::display(format!("Failed to push frame: {:?}", e)))?;

        trace!("Presented {}x{} frame to window", dims.0, dims.1);
        Ok(())
    }

    async fn poll_exit(&mut self, timeout: Duration) -> bool {
        // Window closure or a sink failure surfaces on the bus
        if let Some(bus) = self.pipeline.bus() {
            while let Some(msg) = bus.pop() {
                match msg.view() {
                    gstreamer::MessageView::Error(err) => {
                        error!("Window pipeline error: {}", err.error());
                        return true;
                    }
                    gstreamer::MessageView::Eos(_) => {
                        info!("Window pipeline reached end of stream");
                        return true;
                    }
                    _ => {}
                }
            }
        }
        sleep(timeout).await;
        false
    }
}

impl Drop for GstWindowSink {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!("Window pipeline released");
    }
}
