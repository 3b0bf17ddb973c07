//! Text-to-video generation as an asynchronous model invocation.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::{
    remote_error, validation_error, Error, RemoteErrorKind, ValidationErrorKind,
};
use cloud_jobs::locator::ObjectLocator;
use cloud_jobs::orchestrator::{JobOutcome, RunMode};
use cloud_jobs::traits::job::JobStrategy;
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::types::job::{JobPoll, JobStatus, StatusMap};
use log::*;
use serde_json::{json, Value};

use super::{services, Tool};
use crate::media::normalize_first_frame;
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::ports::video::{OutputDataConfig, StartAsyncInvoke, VideoGenerationApi};
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "generate_video";

pub const MODEL_ID: &str = "amazon.nova-reel-v1:0";
pub const VIDEO_FILE_NAME: &str = "output.mp4";
const VIDEO_MIME_TYPE: &str = "video/mp4";

const BEDROCK_SLOT: &str = "bedrock-runtime";
const S3_SLOT: &str = "s3";

const DEFAULT_DIMENSION: &str = "1280x720";
const DEFAULT_FPS: i64 = 24;
const DEFAULT_DURATION_SECS: i64 = 6;

#[derive(Debug, Clone, PartialEq)]
struct VideoRequest {
    prompt: String,
    output: ObjectLocator,
    image: Option<ObjectLocator>,
    dimension: String,
    fps: i64,
    duration_secs: i64,
    seed: i64,
    detach: bool,
}

impl VideoRequest {
    fn from_params(params: &ToolParameters) -> Result<Self, Error> {
        let prompt = params.require_str("prompt")?;

        let output = params.require_str("video_output_s3uri")?;
        if !output.starts_with("s3://") {
            return Err(validation_error(
                ValidationErrorKind::MalformedLocator,
                "video_output_s3uri must start with 's3://'",
            ));
        }
        let output = if output.ends_with('/') {
            output
        } else {
            format!("{}/", output)
        };
        let output = ObjectLocator::parse_s3(&output)?;

        let image = params
            .str("image_input_s3uri")
            .map(|uri| ObjectLocator::parse_s3(&uri))
            .transpose()?;
        if let Some(image) = &image {
            if image.key().is_empty() {
                return Err(validation_error(
                    ValidationErrorKind::MalformedLocator,
                    "image_input_s3uri must name an object",
                ));
            }
        }

        let dimension = params
            .str("dimension")
            .unwrap_or_else(|| DEFAULT_DIMENSION.to_string());
        if !is_dimension(&dimension) {
            return Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                &format!("dimension '{}' must look like 1280x720", dimension),
            ));
        }

        let fps = params.i64("fps", DEFAULT_FPS)?;
        let duration_secs = params.i64("duration", DEFAULT_DURATION_SECS)?;
        let seed = params.i64("seed", 0)?;
        if fps <= 0 || duration_secs <= 0 || seed < 0 {
            return Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                "fps and duration must be positive and seed must not be negative",
            ));
        }

        Ok(Self {
            prompt,
            output,
            image,
            dimension,
            fps,
            duration_secs,
            seed,
            detach: params.bool("async", true)?,
        })
    }

    /// `first_frame` is a base64 PNG.
    fn model_input(&self, first_frame: Option<String>) -> Value {
        let mut text_to_video = json!({ "text": self.prompt });
        if let Some(bytes) = first_frame {
            text_to_video["images"] = json!([{ "format": "png", "source": { "bytes": bytes } }]);
        }

        json!({
            "taskType": "TEXT_VIDEO",
            "textToVideoParams": text_to_video,
            "videoGenerationConfig": {
                "durationSeconds": self.duration_secs,
                "fps": self.fps,
                "dimension": self.dimension,
                "seed": self.seed,
            },
        })
    }
}

fn is_dimension(value: &str) -> bool {
    match value.split_once('x') {
        Some((width, height)) => {
            [width, height]
                .iter()
                .all(|side| !side.is_empty() && side.bytes().all(|b| b.is_ascii_digit()))
        }
        None => false,
    }
}

/// Where the service writes the video for an invocation output prefix.
fn video_locator(output_uri: &str) -> Result<ObjectLocator, Error> {
    Ok(ObjectLocator::parse_s3(output_uri)?.join(VIDEO_FILE_NAME))
}

struct VideoJobStrategy<'a, C: VideoGenerationApi + ?Sized> {
    api: &'a C,
    request: StartAsyncInvoke,
}

#[async_trait]
impl<C: VideoGenerationApi + ?Sized> JobStrategy for VideoJobStrategy<'_, C> {
    async fn submit(&self) -> Result<String, Error> {
        self.api.start_async_invoke(self.request.clone()).await
    }

    async fn poll(&self, job_id: &str) -> Result<JobPoll, Error> {
        let invocation = self.api.get_async_invoke(job_id).await?;
        let mut poll = JobPoll::status(&invocation.status);
        if let Some(uri) = invocation.output_uri() {
            poll = poll.with_artifact(uri);
        }
        if let Some(message) = &invocation.failure_message {
            poll = poll.with_failure(message);
        }
        Ok(poll)
    }

    fn status_map(&self) -> StatusMap {
        StatusMap::new()
            .with("InProgress", JobStatus::InProgress)
            .with("Completed", JobStatus::Completed)
            .with("Failed", JobStatus::Failed)
    }
}

pub struct GenerateVideoHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> GenerateVideoHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Self {
        Self {
            settings,
            lease: ClientLease::new(factory)
                .with_slot(BEDROCK_SLOT, services::BEDROCK_RUNTIME)
                .with_slot(S3_SLOT, services::S3),
        }
    }
}

impl<F> GenerateVideoHandler<F>
where
    F: ClientFactory,
    F::Client: VideoGenerationApi + ObjectStore,
{
    /// The image at `image`, normalized to a 1280x720 RGB PNG and base64
    /// encoded.
    async fn first_frame(&self, image: &ObjectLocator) -> Result<String, Error> {
        let s3 = self.lease.get(S3_SLOT)?;
        let object = s3.get_object(image.bucket(), image.key()).await?;
        let png = normalize_first_frame(&object.body)?;
        debug!("Using {} ({} bytes as PNG) as first frame", image, png.len());
        Ok(BASE64.encode(png))
    }

    /// The finished video as text plus blob, or text alone when the download
    /// fails.
    async fn deliver(&self, video: &ObjectLocator) -> Result<ToolResponse, Error> {
        let s3 = self.lease.get(S3_SLOT)?;
        match s3.get_object(video.bucket(), video.key()).await {
            Ok(object) => Ok(ToolResponse::text(format!("Video is available at: {}", video))
                .with_blob(object.body, VIDEO_MIME_TYPE, Some(VIDEO_FILE_NAME))),
            Err(e) => {
                warn!("Failed to download generated video {}: {}", video, e);
                Ok(ToolResponse::text(format!(
                    "Video generation completed but failed to download video: {}\nVideo is available at: {}",
                    e.message(),
                    video
                )))
            }
        }
    }
}

#[async_trait]
impl<F> Tool for GenerateVideoHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: VideoGenerationApi + ObjectStore + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let request = VideoRequest::from_params(params)?;
        let credentials = self.settings.resolve_credentials(params);
        self.lease.ensure_all(&credentials)?;
        let bedrock = self.lease.get(BEDROCK_SLOT)?;

        let first_frame = match &request.image {
            Some(image) => Some(self.first_frame(image).await?),
            None => None,
        };

        let strategy = VideoJobStrategy {
            api: bedrock.as_ref(),
            request: StartAsyncInvoke {
                model_id: MODEL_ID.to_string(),
                model_input: request.model_input(first_frame),
                output_data_config: OutputDataConfig::s3(&request.output.to_string()),
            },
        };
        let mode = if request.detach {
            RunMode::Detach
        } else {
            RunMode::Wait
        };

        match self.settings.orchestrator().run(&strategy, mode).await? {
            JobOutcome::Detached { job_id } => {
                let invocation = bedrock.get_async_invoke(&job_id).await?;
                let output = invocation
                    .output_uri()
                    .map(str::to_string)
                    .unwrap_or_else(|| request.output.to_string());
                Ok(ToolResponse::text(format!(
                    "Video generation started.\nInvocation ARN: {}\nVideo will be available at: {}",
                    job_id,
                    video_locator(&output)?
                )))
            }
            JobOutcome::Completed {
                artifact_locator, ..
            } => {
                let output = artifact_locator.unwrap_or_else(|| request.output.to_string());
                self.deliver(&video_locator(&output)?).await
            }
            JobOutcome::Failed { job_id, reason } => {
                warn!("Video generation {} failed: {}", job_id, reason);
                Err(remote_error(
                    RemoteErrorKind::JobFailed,
                    &format!("Video generation failed: {}", reason),
                ))
            }
        }
    }
}
