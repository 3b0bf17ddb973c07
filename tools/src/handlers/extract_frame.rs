//! Pulls evenly spaced frames out of an animated GIF.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use cloud_jobs::fetcher::{parse_source, Fetcher, ScratchDir};
use log::*;

use super::Tool;
use crate::media::{count_gif_frames, extract_gif_frames, frame_indices};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "extract_frame";

const DEFAULT_FRAME_COUNT: i64 = 5;
const GIF_INPUT_TYPE: &str = "GIF";
const GIF_FILE_NAME: &str = "input.gif";
const FRAME_MIME_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq)]
struct FrameRequest {
    input_url: String,
    frame_count: usize,
}

impl FrameRequest {
    fn from_params(params: &ToolParameters) -> Result<Self, Error> {
        let input_url = params.require_str("input_url")?;
        parse_source(&input_url)?;

        let input_type = params
            .str("input_type")
            .unwrap_or_else(|| GIF_INPUT_TYPE.to_string());
        if !input_type.eq_ignore_ascii_case(GIF_INPUT_TYPE) {
            return Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                "Only GIF input is supported.",
            ));
        }

        let frame_count = params.i64("frame_count", DEFAULT_FRAME_COUNT)?;
        let frame_count = usize::try_from(frame_count)
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| {
                validation_error(
                    ValidationErrorKind::InvalidParameter,
                    "frame_count must be at least 1",
                )
            })?;

        Ok(Self {
            input_url,
            frame_count,
        })
    }
}

fn frame_file_name(position: usize) -> String {
    format!("frame_{:03}.png", position)
}

pub struct ExtractFrameHandler {
    fetcher: Fetcher,
}

impl ExtractFrameHandler {
    pub fn new(settings: Arc<ToolSettings>) -> Result<Self, Error> {
        Ok(Self {
            fetcher: settings.fetcher()?,
        })
    }

    /// Download into `scratch` and decode the requested frames as PNGs.
    ///
    /// Returns the frames and the GIF's total frame count. `scratch` is
    /// removed when this returns, whatever the outcome.
    async fn extract(
        &self,
        request: &FrameRequest,
        scratch: ScratchDir,
    ) -> Result<(Vec<Vec<u8>>, usize), Error> {
        let spooled = self
            .fetcher
            .fetch_to_file(&request.input_url, &scratch, GIF_FILE_NAME)
            .await?;
        debug!("Downloaded {} bytes of GIF", spooled.length);

        let count = request.frame_count;
        let path = spooled.path.clone();
        let (frames, total) = tokio::task::spawn_blocking(move || {
            let total = count_gif_frames(&path)?;
            if total == 0 {
                return Err(validation_error(
                    ValidationErrorKind::InvalidParameter,
                    "GIF contains no frames",
                ));
            }
            let indices = frame_indices(total, count);
            debug!("Extracting frames {:?} of {}", indices, total);
            Ok((extract_gif_frames(&path, &indices)?, total))
        })
        .await
        .map_err(|e| {
            error!("Frame extraction task failed: {:?}", e);
            Error::from(std::io::Error::other(e))
        })??;

        scratch.close()?;
        Ok((frames, total))
    }
}

#[async_trait]
impl Tool for ExtractFrameHandler {
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let request = FrameRequest::from_params(params)?;
        let (frames, total) = self.extract(&request, ScratchDir::new()?).await?;
        info!("Extracted {} of {} frames", frames.len(), total);

        let mut response = ToolResponse::text(format!(
            "Extracted {} frames from a GIF of {} frames.",
            frames.len(),
            total
        ));
        for (position, frame) in frames.into_iter().enumerate() {
            let name = frame_file_name(position);
            response = response.with_blob(frame, FRAME_MIME_TYPE, Some(name.as_str()));
        }
        Ok(response)
    }
}
