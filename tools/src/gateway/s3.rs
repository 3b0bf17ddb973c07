//! Path-style object storage.

use async_trait::async_trait;
use cloud_auth::credentials::DEFAULT_REGION;
use cloud_jobs::error::{remote_error, Error, ErrorKind, RemoteErrorKind};
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::types::storage::{BucketCreation, CreateBucket, PutObject, StoredObject};
use log::*;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, StatusCode};

use super::{error_details, response_header, service_error, set_header, ApiClient};

const BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";

impl ApiClient {
    fn object_url(&self, bucket: &str, key: &str) -> Result<url::Url, Error> {
        let mut segments = vec![bucket];
        segments.extend(key.split('/'));
        self.url(&segments)
    }
}

fn location_constraint(region: &str) -> String {
    format!(
        "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <LocationConstraint>{}</LocationConstraint>\
         </CreateBucketConfiguration>",
        region
    )
}

#[async_trait]
impl ObjectStore for ApiClient {
    async fn put_object(&self, request: PutObject) -> Result<(), Error> {
        let mut http_request = Request::new(Method::PUT, self.object_url(&request.bucket, &request.key)?);
        if let Some(content_type) = &request.content_type {
            set_header(&mut http_request, "content-type", content_type)?;
        }
        if let Some(acl) = &request.acl {
            set_header(&mut http_request, "x-amz-acl", acl)?;
        }
        let length = request.body.len();
        *http_request.body_mut() = Some(request.body.into());

        self.send_once(http_request).await?;
        debug!("Stored {} bytes at s3://{}/{}", length, request.bucket, request.key);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, Error> {
        let request = Request::new(Method::GET, self.object_url(bucket, key)?);
        let response = self.send(request).await.map_err(|err| {
            if err.error_kind != ErrorKind::Remote(RemoteErrorKind::NotFound) {
                return err;
            }
            if err.message().contains("NoSuchBucket") {
                remote_error(
                    RemoteErrorKind::NotFound,
                    &format!("Bucket '{}' does not exist", bucket),
                )
            } else {
                remote_error(
                    RemoteErrorKind::NotFound,
                    &format!("Object '{}' does not exist in bucket '{}'", key, bucket),
                )
            }
        })?;

        let content_type = response_header(&response, CONTENT_TYPE.as_str());
        let last_modified = response_header(&response, "last-modified");
        let etag = response_header(&response, "etag").map(|etag| etag.trim_matches('"').to_string());
        let body = response.bytes().await?.to_vec();

        debug!("Read {} bytes from s3://{}/{}", body.len(), bucket, key);
        Ok(StoredObject {
            body,
            content_type,
            last_modified,
            etag,
        })
    }

    async fn create_bucket(&self, request: CreateBucket) -> Result<BucketCreation, Error> {
        let mut http_request = Request::new(Method::PUT, self.url(&[&request.bucket])?);
        if let Some(acl) = &request.acl {
            set_header(&mut http_request, "x-amz-acl", acl)?;
        }
        if request.region != DEFAULT_REGION {
            http_request
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
            *http_request.body_mut() = Some(location_constraint(&request.region).into());
        }

        let response = self.execute(http_request).await?;
        let status = response.status();
        if status.is_success() {
            let location = response_header(&response, "location");
            info!("Created bucket {} in {}", request.bucket, request.region);
            return Ok(BucketCreation::Created { location });
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT
            && error_details(&body).0.as_deref() == Some(BUCKET_ALREADY_OWNED)
        {
            info!("Bucket {} already exists and is owned by the caller", request.bucket);
            return Ok(BucketCreation::AlreadyOwned);
        }

        let err = service_error(status, &body);
        error!("Failed to create bucket {}: {}", request.bucket, err.message());
        Err(err)
    }
}
