//! Types for object storage operations.

use bytes::Bytes;

/// Canned ACL applied to uploaded objects unless the caller asks otherwise.
pub const DEFAULT_OBJECT_ACL: &str = "private";

/// Request to store one object.
#[derive(Debug, Clone, PartialEq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    /// Shared buffer, so a retried put does not copy the body.
    pub body: Bytes,
    pub content_type: Option<String>,
    pub acl: Option<String>,
}

/// An object read back from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl StoredObject {
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Request to create a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBucket {
    pub bucket: String,
    /// Region the bucket lives in; a location constraint is sent for every
    /// region except the default one.
    pub region: String,
    pub acl: Option<String>,
}

/// Result of a create-if-absent bucket call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketCreation {
    /// `location` is what the service reported for the new bucket, if anything.
    Created { location: Option<String> },
    AlreadyOwned,
}
