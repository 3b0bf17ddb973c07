//! Copies a remote file into a bucket.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::Error;
use cloud_jobs::fetcher::{parse_source, Fetcher};
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::uploader::{UploadTarget, Uploader};
use serde_json::json;

use super::{services, Tool};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "upload_object";

const S3_SLOT: &str = "s3";

fn upload_target(params: &ToolParameters) -> Result<UploadTarget, Error> {
    let bucket = params.require_str("bucket_name")?;
    let prefix = params
        .str("key_prefix")
        .map(|prefix| prefix.trim_matches(|c| c == '/' || c == ' ').to_string())
        .filter(|prefix| !prefix.is_empty());
    let key = params
        .str("object_key")
        .map(|key| key.trim_start_matches('/').to_string())
        .filter(|key| !key.is_empty());

    let (key, key_prefix) = match (key, prefix) {
        (Some(key), Some(prefix)) => (Some(format!("{}/{}", prefix, key)), None),
        (Some(key), None) => (Some(key), None),
        (None, prefix) => (None, prefix.map(|prefix| format!("{}/", prefix))),
    };

    Ok(UploadTarget {
        bucket,
        key,
        key_prefix,
        acl: params.str("acl"),
    })
}

pub struct UploadObjectHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    fetcher: Fetcher,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> UploadObjectHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Result<Self, Error> {
        Ok(Self {
            fetcher: settings.fetcher()?,
            lease: ClientLease::new(factory).with_slot(S3_SLOT, services::S3),
            settings,
        })
    }
}

#[async_trait]
impl<F> Tool for UploadObjectHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: ObjectStore + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let format = params.result_format()?;
        let file_url = params.require_str("file_url")?;
        parse_source(&file_url)?;
        let target = upload_target(params)?;

        let credentials = self.settings.resolve_credentials(params);
        self.lease.ensure_all(&credentials)?;
        let s3 = self.lease.get(S3_SLOT)?;

        let locator = Uploader::new(&self.fetcher, s3.as_ref())
            .with_key_prefix(&self.settings.upload_key_prefix)
            .upload(&file_url, target)
            .await?;

        let s3_uri = locator.to_string();
        let record = json!({
            "bucket_name": locator.bucket(),
            "object_key": locator.key(),
            "s3_uri": s3_uri,
        });
        Ok(ToolResponse::record(format, record, s3_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{settings, MockCloud, MockFactory};
    use super::*;
    use cloud_jobs::error::{ErrorKind, ValidationErrorKind};
    use mockito::Server;

    fn params() -> ToolParameters {
        ToolParameters::default().with("bucket_name", "media")
    }

    #[test]
    fn test_explicit_key_with_prefix() {
        let target = upload_target(
            &params()
                .with("object_key", "/report.pdf")
                .with("key_prefix", " /docs/2024/ "),
        )
        .unwrap();

        assert_eq!(target.key.as_deref(), Some("docs/2024/report.pdf"));
        assert_eq!(target.key_prefix, None);
    }

    #[test]
    fn test_derived_key_uses_prefix() {
        let target = upload_target(&params().with("key_prefix", "incoming")).unwrap();
        assert_eq!(target.key, None);
        assert_eq!(target.key_prefix.as_deref(), Some("incoming/"));

        let target = upload_target(&params()).unwrap();
        assert_eq!(target.key, None);
        assert_eq!(target.key_prefix, None);
    }

    #[tokio::test]
    async fn test_missing_bucket_is_rejected_before_any_client() {
        let factory = MockFactory::idle();
        let mut handler = UploadObjectHandler::new(settings(), factory.clone()).unwrap();

        let err = handler
            .invoke(&ToolParameters::default().with("file_url", "https://host/a.txt"))
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Validation(ValidationErrorKind::MissingParameter)
        );
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_uploads_under_derived_key() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/photo.jpg")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body("jpg")
            .create_async()
            .await;

        let factory = MockFactory::new(|_, _| {
            let mut cloud = MockCloud::new();
            cloud
                .expect_put_object()
                .withf(|put| {
                    put.bucket == "media"
                        && put.key == "incoming/photo.jpg"
                        && put.body == b"jpg".to_vec()
                        && put.acl.as_deref() == Some("public-read")
                })
                .times(1)
                .returning(|_| Ok(()));
            cloud
        });

        let mut handler = UploadObjectHandler::new(settings(), factory).unwrap();
        let response = handler
            .invoke(
                &params()
                    .with("file_url", format!("{}/files/photo.jpg", server.url()))
                    .with("key_prefix", "incoming")
                    .with("acl", "public-read")
                    .with("result_format", "json"),
            )
            .await
            .unwrap();

        assert_eq!(
            response.json_content(),
            Some(&json!({
                "bucket_name": "media",
                "object_key": "incoming/photo.jpg",
                "s3_uri": "s3://media/incoming/photo.jpg",
            }))
        );
    }

    #[tokio::test]
    async fn test_text_result_is_the_uri() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/a.txt")
            .with_status(200)
            .with_body("a")
            .create_async()
            .await;

        let factory = MockFactory::new(|_, _| {
            let mut cloud = MockCloud::new();
            cloud.expect_put_object().returning(|_| Ok(()));
            cloud
        });

        let mut handler = UploadObjectHandler::new(settings(), factory).unwrap();
        let response = handler
            .invoke(
                &params()
                    .with("file_url", format!("{}/a.txt", server.url()))
                    .with("object_key", "notes/a.txt"),
            )
            .await
            .unwrap();

        assert_eq!(response.text_content(), "s3://media/notes/a.txt");
    }
}
