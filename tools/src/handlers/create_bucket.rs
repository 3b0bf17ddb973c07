use std::sync::Arc;

use async_trait::async_trait;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::Error;
use cloud_jobs::traits::storage::ObjectStore;
use cloud_jobs::types::storage::{BucketCreation, CreateBucket, DEFAULT_OBJECT_ACL};
use log::*;
use serde_json::json;

use super::{services, Tool};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "create_bucket";

const S3_SLOT: &str = "s3";

pub struct CreateBucketHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> CreateBucketHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Self {
        Self {
            settings,
            lease: ClientLease::new(factory).with_slot(S3_SLOT, services::S3),
        }
    }
}

#[async_trait]
impl<F> Tool for CreateBucketHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: ObjectStore + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    /// Creating a bucket the caller already owns counts as success.
    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let format = params.result_format()?;
        let bucket = params.require_str("bucket_name")?;
        let acl = params.str("acl");

        let credentials = self.settings.resolve_credentials(params);
        let region = credentials.region().to_string();
        self.lease.ensure_all(&credentials)?;
        let s3 = self.lease.get(S3_SLOT)?;

        let creation = s3
            .create_bucket(CreateBucket {
                bucket: bucket.clone(),
                region: region.clone(),
                acl: acl.clone(),
            })
            .await?;

        let (location, already_owned) = match creation {
            BucketCreation::Created { location } => {
                info!("Created bucket {} in {}", bucket, region);
                (location.unwrap_or_else(|| format!("/{}", bucket)), false)
            }
            BucketCreation::AlreadyOwned => {
                info!("Bucket {} already exists and is owned by the caller", bucket);
                (format!("/{}", bucket), true)
            }
        };

        let summary = if already_owned {
            format!("Bucket '{}' already exists in {} and is owned by you.", bucket, region)
        } else {
            format!("Bucket '{}' created in {}. Location: {}", bucket, region, location)
        };
        let record = json!({
            "bucket_name": bucket,
            "region": region,
            "acl": acl.as_deref().unwrap_or(DEFAULT_OBJECT_ACL),
            "location": location,
            "s3_uri": format!("s3://{}/", bucket),
            "already_owned": already_owned,
        });
        Ok(ToolResponse::record(format, record, summary))
    }
}
