//! Copies a remote file into object storage.

use bytes::Bytes;
use log::*;
use url::Url;
use uuid::Uuid;

use crate::error::{validation_error, Error, ValidationErrorKind};
use crate::fetcher::{parse_source, retry_transient, Fetcher};
use crate::locator::ObjectLocator;
use crate::traits::storage::ObjectStore;
use crate::types::storage::{PutObject, DEFAULT_OBJECT_ACL};

/// Key prefix used for uploads when the caller does not pick one.
pub const DEFAULT_KEY_PREFIX: &str = "transcribe-files/";

const PREVIEW_SUFFIX: &str = "/file-preview";

/// Derive an object key from a source URL.
///
/// Query and fragment are ignored, a trailing `/file-preview` is removed,
/// and the last path segment becomes the file name. A random name is used
/// when the path has no usable segment.
pub fn derive_object_key(source_uri: &str, prefix: &str) -> Result<String, Error> {
    let url = parse_source(source_uri)?;
    Ok(format!("{}{}", prefix, file_name_from_url(&url)))
}

fn file_name_from_url(url: &Url) -> String {
    let path = url.path();
    let path = path.strip_suffix(PREVIEW_SUFFIX).unwrap_or(path);

    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Where an upload should land.
#[derive(Debug, Clone, Default)]
pub struct UploadTarget {
    pub bucket: String,
    /// Full object key. Derived from the source when absent.
    pub key: Option<String>,
    /// Prefix for derived keys. Falls back to the uploader's prefix.
    pub key_prefix: Option<String>,
    pub acl: Option<String>,
}

impl UploadTarget {
    pub fn bucket(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }
}

/// Fetches a source URL with the fetcher's retry contract and stores it.
///
/// The body is downloaded once. Puts are retried with the fetcher's attempt
/// budget and backoff, and each attempt is a single store call.
pub struct Uploader<'a, S: ObjectStore + ?Sized> {
    fetcher: &'a Fetcher,
    store: &'a S,
    key_prefix: String,
}

impl<'a, S: ObjectStore + ?Sized> Uploader<'a, S> {
    pub fn new(fetcher: &'a Fetcher, store: &'a S) -> Self {
        Self {
            fetcher,
            store,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub async fn upload(&self, source_uri: &str, target: UploadTarget) -> Result<ObjectLocator, Error> {
        if target.bucket.trim().is_empty() {
            return Err(validation_error(
                ValidationErrorKind::MissingParameter,
                "a destination bucket is required",
            ));
        }

        let key = match target.key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => key.to_string(),
            None => {
                let prefix = target.key_prefix.as_deref().unwrap_or(&self.key_prefix);
                derive_object_key(source_uri, prefix)?
            }
        };

        let payload = self.fetcher.fetch(source_uri).await?;
        let body = Bytes::from(payload.bytes);
        debug!("Uploading {} bytes to s3://{}/{}", body.len(), target.bucket, key);

        let acl = target.acl.unwrap_or_else(|| DEFAULT_OBJECT_ACL.to_string());
        retry_transient(self.fetcher.max_attempts(), self.fetcher.backoff(), |attempt| {
            trace!("Put attempt {} for s3://{}/{}", attempt, target.bucket, key);
            self.store.put_object(PutObject {
                bucket: target.bucket.clone(),
                key: key.clone(),
                body: body.clone(),
                content_type: payload.content_type.clone(),
                acl: Some(acl.clone()),
            })
        })
        .await?;

        info!("Uploaded {} to s3://{}/{}", source_uri, target.bucket, key);
        Ok(ObjectLocator::s3(&target.bucket, &key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{transport_error, ErrorKind, TransportErrorKind};
    use crate::types::storage::{BucketCreation, CreateBucket, StoredObject};
    use async_trait::async_trait;
    use cloud_auth::http::RetryAfterPolicy;
    use mockito::Server;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records puts; fails the first `failures` of them transiently.
    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<PutObject>>,
        failures: Mutex<u32>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(&self, request: PutObject) -> Result<(), Error> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(transport_error(TransportErrorKind::Network, "reset"));
            }
            self.puts.lock().unwrap().push(request);
            Ok(())
        }

        async fn get_object(&self, _bucket: &str, _key: &str) -> Result<StoredObject, Error> {
            unimplemented!()
        }

        async fn create_bucket(&self, _request: CreateBucket) -> Result<BucketCreation, Error> {
            unimplemented!()
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(reqwest::Client::new())
            .with_backoff(RetryAfterPolicy::new(3).with_base_delay(Duration::ZERO))
    }

    #[test]
    fn test_derive_key_strips_query_and_preview_suffix() {
        assert_eq!(
            derive_object_key(
                "https://files.example.com/files/abc/meeting.mp3/file-preview?timestamp=1&sign=x",
                DEFAULT_KEY_PREFIX
            )
            .unwrap(),
            "transcribe-files/meeting.mp3"
        );
        assert_eq!(
            derive_object_key("https://host/a/b/clip.wav#t=3", "media/").unwrap(),
            "media/clip.wav"
        );
    }

    #[test]
    fn test_derive_key_uses_random_name_without_segment() {
        let key = derive_object_key("https://host/", "p/").unwrap();
        let name = key.strip_prefix("p/").unwrap();
        assert!(Uuid::parse_str(name).is_ok());
    }

    #[test]
    fn test_derive_key_rejects_bad_source() {
        let err = derive_object_key("file-preview", DEFAULT_KEY_PREFIX).unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Validation(ValidationErrorKind::MalformedLocator)
        );
    }

    #[tokio::test]
    async fn test_upload_stores_private_object_under_derived_key() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/media/talk.mp3")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body("mp3-data")
            .create_async()
            .await;

        let store = RecordingStore::default();
        let fetcher = fetcher();
        let locator = Uploader::new(&fetcher, &store)
            .upload(
                &format!("{}/media/talk.mp3?sig=abc", server.url()),
                UploadTarget::bucket("inbox"),
            )
            .await
            .unwrap();

        assert_eq!(locator.to_string(), "s3://inbox/transcribe-files/talk.mp3");
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(&puts[0].body[..], b"mp3-data");
        assert_eq!(puts[0].acl.as_deref(), Some("private"));
        assert_eq!(puts[0].content_type.as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn test_upload_honors_explicit_key_and_retries_put() {
        let mut server = Server::new_async().await;
        let download = server
            .mock("GET", "/doc.pdf")
            .with_status(200)
            .with_body("%PDF")
            .expect(1)
            .create_async()
            .await;

        let store = RecordingStore {
            failures: Mutex::new(2),
            ..Default::default()
        };
        let fetcher = fetcher();
        let target = UploadTarget {
            bucket: "docs".to_string(),
            key: Some("reports/q1.pdf".to_string()),
            acl: Some("bucket-owner-full-control".to_string()),
            ..Default::default()
        };

        let locator = Uploader::new(&fetcher, &store)
            .upload(&format!("{}/doc.pdf", server.url()), target)
            .await
            .unwrap();

        assert_eq!(locator.key(), "reports/q1.pdf");
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(*store.failures.lock().unwrap(), 0);
        assert_eq!(puts[0].acl.as_deref(), Some("bucket-owner-full-control"));
        download.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_reports_put_attempts_when_budget_runs_out() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/clip.wav")
            .with_status(200)
            .with_body("RIFF")
            .expect(1)
            .create_async()
            .await;

        let store = RecordingStore {
            failures: Mutex::new(5),
            ..Default::default()
        };
        let fetcher = fetcher();

        let err = Uploader::new(&fetcher, &store)
            .upload(&format!("{}/clip.wav", server.url()), UploadTarget::bucket("inbox"))
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Transport(TransportErrorKind::RetriesExhausted { attempts: 3 })
        );
        assert_eq!(*store.failures.lock().unwrap(), 2);
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_bucket() {
        let store = RecordingStore::default();
        let fetcher = fetcher();

        let err = Uploader::new(&fetcher, &store)
            .upload("https://host/a.mp3", UploadTarget::bucket(" "))
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Validation(ValidationErrorKind::MissingParameter)
        );
    }
}
