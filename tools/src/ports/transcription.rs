use async_trait::async_trait;
use cloud_jobs::error::Error;
use serde::{Deserialize, Serialize};

/// Start request for a batch transcription job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartTranscription {
    pub transcription_job_name: String,
    pub media: Media,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identify_language: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identify_multiple_languages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<TranscriptionSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Media {
    pub media_file_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptionSettings {
    pub show_speaker_labels: bool,
    pub max_speaker_labels: u32,
}

/// A transcription job as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptionJob {
    #[serde(default)]
    pub transcription_job_name: Option<String>,
    pub transcription_job_status: String,
    #[serde(default)]
    pub transcript: Option<TranscriptLocation>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptLocation {
    #[serde(default)]
    pub transcript_file_uri: Option<String>,
}

impl TranscriptionJob {
    pub fn transcript_uri(&self) -> Option<&str> {
        self.transcript
            .as_ref()
            .and_then(|transcript| transcript.transcript_file_uri.as_deref())
    }
}

#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    async fn start_transcription_job(&self, request: StartTranscription) -> Result<(), Error>;

    async fn get_transcription_job(&self, job_name: &str) -> Result<TranscriptionJob, Error>;
}
