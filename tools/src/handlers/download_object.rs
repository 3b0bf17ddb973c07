//! Reads one stored object back as a blob with its metadata.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use cloud_jobs::locator::ObjectLocator;
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::types::storage::StoredObject;
use log::*;
use serde_json::{json, Value};

use super::{services, Tool};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "download_object";

const S3_SLOT: &str = "s3";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_FILE_NAME: &str = "downloaded_file";

fn metadata(locator: &ObjectLocator, source: &str, object: &StoredObject) -> Value {
    json!({
        "bucket": locator.bucket(),
        "key": locator.key(),
        "content_type": content_type(object),
        "content_length": object.content_length(),
        "etag": object.etag,
        "last_modified": object.last_modified,
        "s3_uri": source,
    })
}

fn content_type(object: &StoredObject) -> &str {
    object
        .content_type
        .as_deref()
        .filter(|content_type| !content_type.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// `key: value` lines, skipping nulls.
fn metadata_text(metadata: &Value) -> String {
    let Some(fields) = metadata.as_object() else {
        return String::new();
    };
    fields
        .iter()
        .filter_map(|(name, value)| match value {
            Value::Null => None,
            Value::String(text) => Some(format!("{}: {}", name, text)),
            other => Some(format!("{}: {}", name, other)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct DownloadObjectHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> DownloadObjectHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Self {
        Self {
            settings,
            lease: ClientLease::new(factory).with_slot(S3_SLOT, services::S3),
        }
    }
}

#[async_trait]
impl<F> Tool for DownloadObjectHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: ObjectStore + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let source = params.require_str("s3_uri")?;
        let locator = ObjectLocator::parse_s3(&source)?;
        if locator.key().is_empty() {
            return Err(validation_error(
                ValidationErrorKind::MalformedLocator,
                "Invalid S3 URI format. Use s3://bucket/key",
            ));
        }

        let credentials = self.settings.resolve_credentials(params);
        self.lease.ensure_all(&credentials)?;
        let s3 = self.lease.get(S3_SLOT)?;

        let object = s3.get_object(locator.bucket(), locator.key()).await?;
        info!("Downloaded {} ({} bytes)", locator, object.content_length());

        let filename = locator
            .key()
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME);
        let record = metadata(&locator, &source, &object);
        let text = metadata_text(&record);
        let mime_type = content_type(&object).to_string();

        Ok(ToolResponse::new()
            .with_blob(object.body, &mime_type, Some(filename))
            .with_json(record)
            .with_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{settings, MockCloud, MockFactory};
    use super::*;
    use crate::output::ToolMessage;
    use cloud_jobs::error::{remote_error, ErrorKind, RemoteErrorKind};

    #[test]
    fn test_metadata_text_skips_nulls() {
        let record = json!({"bucket": "media", "etag": null, "content_length": 3});
        assert_eq!(metadata_text(&record), "bucket: media\ncontent_length: 3");
    }

    #[tokio::test]
    async fn test_key_is_required() {
        let factory = MockFactory::idle();
        let mut handler = DownloadObjectHandler::new(settings(), factory.clone());

        for uri in ["s3://media/", "https://media/a.txt"] {
            let err = handler
                .invoke(&ToolParameters::default().with("s3_uri", uri))
                .await
                .unwrap_err();
            assert_eq!(
                err.error_kind,
                ErrorKind::Validation(ValidationErrorKind::MalformedLocator)
            );
        }
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_returns_blob_record_and_text() {
        let factory = MockFactory::new(|_, _| {
            let mut cloud = MockCloud::new();
            cloud
                .expect_get_object()
                .withf(|bucket, key| bucket == "media" && key == "reports/q3.pdf")
                .times(1)
                .returning(|_, _| {
                    Ok(StoredObject {
                        body: b"%PDF".to_vec(),
                        content_type: Some("application/pdf".to_string()),
                        etag: Some("abc123".to_string()),
                        last_modified: None,
                    })
                });
            cloud
        });

        let mut handler = DownloadObjectHandler::new(settings(), factory);
        let response = handler
            .invoke(&ToolParameters::default().with("s3_uri", "s3://media/reports/q3.pdf"))
            .await
            .unwrap();

        assert_eq!(
            response.blobs().next(),
            Some(&ToolMessage::Blob {
                bytes: b"%PDF".to_vec(),
                mime_type: "application/pdf".to_string(),
                filename: Some("q3.pdf".to_string()),
            })
        );
        let record = response.json_content().unwrap();
        assert_eq!(record["content_length"], 4);
        assert_eq!(record["last_modified"], Value::Null);
        let text = response.text_content();
        assert!(text.contains("key: reports/q3.pdf"));
        assert!(text.contains("etag: abc123"));
        assert!(!text.contains("last_modified"));
    }

    #[tokio::test]
    async fn test_missing_object_error_is_propagated() {
        let factory = MockFactory::new(|_, _| {
            let mut cloud = MockCloud::new();
            cloud.expect_get_object().returning(|bucket, key| {
                Err(remote_error(
                    RemoteErrorKind::NotFound,
                    &format!("Object '{}' does not exist in bucket '{}'", key, bucket),
                ))
            });
            cloud
        });

        let mut handler = DownloadObjectHandler::new(settings(), factory);
        let err = handler
            .invoke(&ToolParameters::default().with("s3_uri", "s3://media/gone.txt"))
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Remote(RemoteErrorKind::NotFound));
        assert_eq!(err.message(), "Object 'gone.txt' does not exist in bucket 'media'");
    }
}
