//! Client construction trait.

use crate::credentials::CredentialRecord;
use crate::error::Error;

/// Builds a network client for one service from resolved credentials.
///
/// Implementations should:
/// - Always bind the client to `credentials.region()`
/// - Pass the access key pair only when [`CredentialRecord::key_pair`] returns one
/// - Release any connection state when the client is dropped
pub trait ClientFactory: Send + Sync {
    /// The client handle type held by a lease.
    type Client: Send + Sync;

    /// Build a client for `service` (e.g. "s3", "transcribe").
    fn create(&self, service: &str, credentials: &CredentialRecord) -> Result<Self::Client, Error>;
}
