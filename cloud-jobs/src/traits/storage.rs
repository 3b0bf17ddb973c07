//! Object storage trait.

use crate::types::storage::{BucketCreation, CreateBucket, PutObject, StoredObject};
use crate::Error;
use async_trait::async_trait;

/// Abstraction over a bucket/key object store.
///
/// The uploader and the storage handlers talk to this trait only, so tests
/// can substitute an in-memory store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `request.body` under `request.bucket/request.key`.
    ///
    /// One call is one attempt. Retrying is up to the caller.
    async fn put_object(&self, request: PutObject) -> Result<(), Error>;

    /// Read an object with its metadata.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, Error>;

    /// Create a bucket. A bucket the caller already owns is reported as
    /// [`BucketCreation::AlreadyOwned`], not as an error.
    async fn create_bucket(&self, request: CreateBucket) -> Result<BucketCreation, Error>;
}
