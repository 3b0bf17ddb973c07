//! Speech-to-text for a remote audio or video file.
//!
//! The file is copied into the caller's bucket, a batch transcription job is
//! run to completion, and the resulting transcript is rendered with one
//! marker line per speaker change.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::{
    protocol_error, remote_error, validation_error, Error, ProtocolErrorKind, RemoteErrorKind,
    ValidationErrorKind,
};
use cloud_jobs::fetcher::{parse_source, Fetcher};
use cloud_jobs::orchestrator::{JobOutcome, RunMode};
use cloud_jobs::traits::job::JobStrategy;
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::transcript::TranscriptDocument;
use cloud_jobs::types::job::{JobPoll, JobStatus, StatusMap};
use cloud_jobs::uploader::{UploadTarget, Uploader};
use log::*;
use uuid::Uuid;

use super::{services, Tool};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::ports::transcription::{
    Media, StartTranscription, TranscriptionApi, TranscriptionSettings,
};
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "transcribe_audio";

const TRANSCRIBE_SLOT: &str = "transcribe";
const S3_SLOT: &str = "s3";

const DEFAULT_MAX_SPEAKER_LABELS: i64 = 2;
const MAX_SPEAKER_LABELS_RANGE: std::ops::RangeInclusive<i64> = 2..=30;

pub const LANGUAGE_CODES: &[&str] = &[
    "af-ZA", "ar-AE", "ar-SA", "da-DK", "de-CH", "de-DE", "en-AB", "en-AU", "en-GB", "en-IE",
    "en-IN", "en-US", "en-WL", "es-ES", "es-US", "fa-IR", "fr-CA", "fr-FR", "he-IL", "hi-IN",
    "id-ID", "it-IT", "ja-JP", "ko-KR", "ms-MY", "nl-NL", "pt-BR", "pt-PT", "ru-RU", "ta-IN",
    "te-IN", "tr-TR", "zh-CN", "zh-TW", "th-TH", "en-ZA", "en-NZ", "vi-VN", "sv-SE", "ab-GE",
    "ast-ES", "az-AZ", "ba-RU", "be-BY", "bg-BG", "bn-IN", "bs-BA", "ca-ES", "ckb-IQ", "ckb-IR",
    "cs-CZ", "cy-WL", "el-GR", "et-ET", "eu-ES", "fi-FI", "gl-ES", "gu-IN", "ha-NG", "hr-HR",
    "hu-HU", "hy-AM", "is-IS", "ka-GE", "kab-DZ", "kk-KZ", "kn-IN", "ky-KG", "lg-IN", "lt-LT",
    "lv-LV", "mhr-RU", "mi-NZ", "mk-MK", "ml-IN", "mn-MN", "mr-IN", "mt-MT", "no-NO", "or-IN",
    "pa-IN", "pl-PL", "ps-AF", "ro-RO", "rw-RW", "si-LK", "sk-SK", "sl-SI", "so-SO", "sr-RS",
    "su-ID", "sw-BI", "sw-KE", "sw-RW", "sw-TZ", "sw-UG", "tl-PH", "tt-RU", "ug-CN", "uk-UA",
    "uz-UZ", "wo-SN", "zu-ZA",
];

pub const MEDIA_FORMATS: &[&str] = &["mp3", "mp4", "wav", "flac", "ogg", "amr", "webm", "m4a"];

/// How the job determines the spoken language. Exactly one applies.
#[derive(Debug, Clone, PartialEq)]
pub enum LanguageSelection {
    Code(String),
    Identify { options: Option<Vec<String>> },
    IdentifyMultiple { options: Option<Vec<String>> },
}

impl LanguageSelection {
    pub fn from_params(params: &ToolParameters) -> Result<Self, Error> {
        let code = params.str("language_code");
        let multiple = params.bool("identify_multiple_languages", false)?;
        // Single-language identification is the default only when nothing
        // else was asked for.
        let identify = params
            .opt_bool("identify_language")?
            .unwrap_or(code.is_none() && !multiple);

        if let Some(code) = &code {
            check_language(code, "language_code")?;
        }
        let options = match params.str("language_options") {
            Some(raw) => {
                let options: Vec<String> = raw
                    .split('|')
                    .map(str::trim)
                    .filter(|option| !option.is_empty())
                    .map(str::to_string)
                    .collect();
                for option in &options {
                    check_language(option, "language_options")?;
                }
                Some(options).filter(|options| !options.is_empty())
            }
            None => None,
        };

        let chosen = [code.is_some(), identify, multiple]
            .iter()
            .filter(|chosen| **chosen)
            .count();
        if chosen > 1 {
            return Err(validation_error(
                ValidationErrorKind::ConflictingModes,
                "use exactly one of language_code, identify_language or identify_multiple_languages",
            ));
        }

        match code {
            Some(_) if options.is_some() => Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                "language_options only applies to language identification",
            )),
            Some(code) => Ok(LanguageSelection::Code(code)),
            None if identify => Ok(LanguageSelection::Identify { options }),
            None if multiple => Ok(LanguageSelection::IdentifyMultiple { options }),
            None => Err(validation_error(
                ValidationErrorKind::MissingParameter,
                "one of language_code, identify_language or identify_multiple_languages is required",
            )),
        }
    }

    fn apply(&self, request: &mut StartTranscription) {
        match self {
            LanguageSelection::Code(code) => request.language_code = Some(code.clone()),
            LanguageSelection::Identify { options } => {
                request.identify_language = Some(true);
                request.language_options = options.clone();
            }
            LanguageSelection::IdentifyMultiple { options } => {
                request.identify_multiple_languages = Some(true);
                request.language_options = options.clone();
            }
        }
    }
}

fn check_language(code: &str, parameter: &str) -> Result<(), Error> {
    if LANGUAGE_CODES.contains(&code) {
        return Ok(());
    }
    Err(validation_error(
        ValidationErrorKind::InvalidParameter,
        &format!("{} '{}' is not a supported language", parameter, code),
    ))
}

#[derive(Debug, Clone)]
struct TranscriptionRequest {
    file_url: String,
    bucket: String,
    media_format: Option<String>,
    language: LanguageSelection,
    speaker_labels: Option<TranscriptionSettings>,
}

impl TranscriptionRequest {
    fn from_params(params: &ToolParameters) -> Result<Self, Error> {
        let file_url = params.require_str("file_url")?;
        parse_source(&file_url)?;
        let bucket = params.require_str("s3_bucket_name")?;

        let media_format = match params.str("file_type") {
            Some(format) => {
                let format = format.to_ascii_lowercase();
                if !MEDIA_FORMATS.contains(&format.as_str()) {
                    return Err(validation_error(
                        ValidationErrorKind::InvalidParameter,
                        &format!(
                            "file_type '{}' is not supported, expected one of {}",
                            format,
                            MEDIA_FORMATS.join(", ")
                        ),
                    ));
                }
                Some(format)
            }
            None => None,
        };

        let speaker_labels = if params.bool("ShowSpeakerLabels", true)? {
            let max = params.i64("MaxSpeakerLabels", DEFAULT_MAX_SPEAKER_LABELS)?;
            if !MAX_SPEAKER_LABELS_RANGE.contains(&max) {
                return Err(validation_error(
                    ValidationErrorKind::InvalidParameter,
                    &format!(
                        "MaxSpeakerLabels must be between {} and {}",
                        MAX_SPEAKER_LABELS_RANGE.start(),
                        MAX_SPEAKER_LABELS_RANGE.end()
                    ),
                ));
            }
            Some(TranscriptionSettings {
                show_speaker_labels: true,
                max_speaker_labels: max as u32,
            })
        } else {
            None
        };

        Ok(Self {
            file_url,
            bucket,
            media_format,
            language: LanguageSelection::from_params(params)?,
            speaker_labels,
        })
    }

    fn start_request(&self, job_name: &str, media_uri: &str) -> StartTranscription {
        let mut request = StartTranscription {
            transcription_job_name: job_name.to_string(),
            media: Media {
                media_file_uri: media_uri.to_string(),
            },
            media_format: self.media_format.clone(),
            settings: self.speaker_labels.clone(),
            ..Default::default()
        };
        self.language.apply(&mut request);
        request
    }
}

/// Job names are `<unix-seconds>-<uuid>`.
fn job_name() -> String {
    format!("{}-{}", chrono::Utc::now().timestamp(), Uuid::new_v4())
}

/// Drives one transcription job through the orchestrator.
struct TranscriptionJobStrategy<'a, C: TranscriptionApi + ?Sized> {
    api: &'a C,
    request: StartTranscription,
}

#[async_trait]
impl<C: TranscriptionApi + ?Sized> JobStrategy for TranscriptionJobStrategy<'_, C> {
    async fn submit(&self) -> Result<String, Error> {
        self.api.start_transcription_job(self.request.clone()).await?;
        Ok(self.request.transcription_job_name.clone())
    }

    async fn poll(&self, job_id: &str) -> Result<JobPoll, Error> {
        let job = self.api.get_transcription_job(job_id).await?;
        let mut poll = JobPoll::status(&job.transcription_job_status);
        if let Some(uri) = job.transcript_uri() {
            poll = poll.with_artifact(uri);
        }
        if let Some(reason) = &job.failure_reason {
            poll = poll.with_failure(reason);
        }
        Ok(poll)
    }

    fn status_map(&self) -> StatusMap {
        StatusMap::new()
            .with("QUEUED", JobStatus::InProgress)
            .with("IN_PROGRESS", JobStatus::InProgress)
            .with("COMPLETED", JobStatus::Completed)
            .with("FAILED", JobStatus::Failed)
    }
}

pub struct TranscribeAudioHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    fetcher: Fetcher,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> TranscribeAudioHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Result<Self, Error> {
        Ok(Self {
            fetcher: settings.fetcher()?,
            lease: ClientLease::new(factory)
                .with_slot(TRANSCRIBE_SLOT, services::TRANSCRIBE)
                .with_slot(S3_SLOT, services::S3),
            settings,
        })
    }
}

#[async_trait]
impl<F> Tool for TranscribeAudioHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: TranscriptionApi + ObjectStore + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let request = TranscriptionRequest::from_params(params)?;
        let credentials = self.settings.resolve_credentials(params);
        self.lease.ensure_all(&credentials)?;
        let transcribe = self.lease.get(TRANSCRIBE_SLOT)?;
        let s3 = self.lease.get(S3_SLOT)?;

        let media = Uploader::new(&self.fetcher, s3.as_ref())
            .with_key_prefix(&self.settings.upload_key_prefix)
            .upload(&request.file_url, UploadTarget::bucket(&request.bucket))
            .await?;

        let strategy = TranscriptionJobStrategy {
            api: transcribe.as_ref(),
            request: request.start_request(&job_name(), &media.to_string()),
        };
        let outcome = self
            .settings
            .orchestrator()
            .run(&strategy, RunMode::Wait)
            .await?;

        let transcript_uri = match outcome {
            JobOutcome::Completed {
                artifact_locator: Some(uri),
                ..
            } => uri,
            JobOutcome::Completed { job_id, .. } => {
                return Err(protocol_error(
                    ProtocolErrorKind::MalformedResponse,
                    &format!("transcription job {} completed without a transcript", job_id),
                ))
            }
            JobOutcome::Failed { job_id, reason } => {
                return Err(remote_error(
                    RemoteErrorKind::JobFailed,
                    &format!("transcription job {} failed: {}", job_id, reason),
                ))
            }
            JobOutcome::Detached { job_id } => {
                return Err(protocol_error(
                    ProtocolErrorKind::InvalidTransition,
                    &format!("transcription job {} was not awaited", job_id),
                ))
            }
        };

        let payload = self.fetcher.fetch(&transcript_uri).await?;
        let document: TranscriptDocument = serde_json::from_slice(&payload.bytes)?;
        let text = document.render();
        info!(
            "Transcribed {} into {} characters",
            request.file_url,
            text.len()
        );

        Ok(ToolResponse::text(text))
    }
}
