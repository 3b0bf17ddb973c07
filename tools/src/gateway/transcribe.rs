//! Batch transcription over the JSON 1.1 target protocol.

use async_trait::async_trait;
use cloud_jobs::error::Error;
use log::*;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{read_json, set_header, ApiClient};
use crate::ports::transcription::{StartTranscription, TranscriptionApi, TranscriptionJob};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const START_JOB_TARGET: &str = "Transcribe.StartTranscriptionJob";
const GET_JOB_TARGET: &str = "Transcribe.GetTranscriptionJob";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetTranscriptionJobRequest<'a> {
    transcription_job_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranscriptionJobResponse {
    transcription_job: TranscriptionJob,
}

impl ApiClient {
    fn target_request<T: Serialize>(&self, target: &str, body: &T) -> Result<reqwest::Request, Error> {
        let mut request = self.json_request(Method::POST, self.url(&[])?, AMZ_JSON, body)?;
        set_header(&mut request, "x-amz-target", target)?;
        Ok(request)
    }
}

#[async_trait]
impl TranscriptionApi for ApiClient {
    async fn start_transcription_job(&self, request: StartTranscription) -> Result<(), Error> {
        debug!(
            "Starting transcription job {} for {}",
            request.transcription_job_name, request.media.media_file_uri
        );

        let response = self
            .send(self.target_request(START_JOB_TARGET, &request)?)
            .await?;
        let _: TranscriptionJobResponse = read_json(response).await?;

        info!("Started transcription job {}", request.transcription_job_name);
        Ok(())
    }

    async fn get_transcription_job(&self, job_name: &str) -> Result<TranscriptionJob, Error> {
        let body = GetTranscriptionJobRequest {
            transcription_job_name: job_name,
        };
        let response = self.send(self.target_request(GET_JOB_TARGET, &body)?).await?;
        let job: TranscriptionJobResponse = read_json(response).await?;

        debug!(
            "Transcription job {} is {}",
            job_name, job.transcription_job.transcription_job_status
        );
        Ok(job.transcription_job)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use super::*;
    use crate::ports::transcription::{Media, TranscriptionSettings};
    use cloud_jobs::error::{ErrorKind, RemoteErrorKind};
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_start_job_sends_target_and_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", START_JOB_TARGET)
            .match_header("content-type", AMZ_JSON)
            .match_body(Matcher::Json(json!({
                "TranscriptionJobName": "1700000000-job",
                "Media": {"MediaFileUri": "s3://inbox/transcribe-files/talk.mp3"},
                "LanguageCode": "en-US",
                "Settings": {"ShowSpeakerLabels": true, "MaxSpeakerLabels": 2}
            })))
            .with_status(200)
            .with_body(r#"{"TranscriptionJob":{"TranscriptionJobName":"1700000000-job","TranscriptionJobStatus":"IN_PROGRESS"}}"#)
            .create_async()
            .await;

        let request = StartTranscription {
            transcription_job_name: "1700000000-job".to_string(),
            media: Media {
                media_file_uri: "s3://inbox/transcribe-files/talk.mp3".to_string(),
            },
            language_code: Some("en-US".to_string()),
            settings: Some(TranscriptionSettings {
                show_speaker_labels: true,
                max_speaker_labels: 2,
            }),
            ..Default::default()
        };

        client(&server.url(), "transcribe")
            .start_transcription_job(request)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_job_reads_status_and_transcript_uri() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_header("x-amz-target", GET_JOB_TARGET)
            .match_body(Matcher::Json(json!({"TranscriptionJobName": "job-1"})))
            .with_status(200)
            .with_body(
                r#"{"TranscriptionJob":{
                    "TranscriptionJobName":"job-1",
                    "TranscriptionJobStatus":"COMPLETED",
                    "Transcript":{"TranscriptFileUri":"https://files.example.com/job-1.json"}
                }}"#,
            )
            .create_async()
            .await;

        let job = client(&server.url(), "transcribe")
            .get_transcription_job("job-1")
            .await
            .unwrap();

        assert_eq!(job.transcription_job_status, "COMPLETED");
        assert_eq!(job.transcript_uri(), Some("https://files.example.com/job-1.json"));
        assert_eq!(job.failure_reason, None);
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type":"NotFoundException","Message":"The requested job couldn't be found."}"#)
            .create_async()
            .await;

        let err = client(&server.url(), "transcribe")
            .get_transcription_job("missing")
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Remote(RemoteErrorKind::NotFound));
    }
}
