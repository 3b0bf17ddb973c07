//! Request signing hook.

use crate::credentials::CredentialRecord;
use crate::error::Error;

/// Applies a service's request-authentication scheme to an outgoing request.
///
/// The signing algorithm itself is supplied by the embedding application;
/// clients call the signer, when one is configured, right before sending.
/// Implementations must use [`CredentialRecord::key_pair`] and leave the
/// request untouched when it returns `None` (anonymous access).
pub trait RequestSigner: Send + Sync {
    fn sign(
        &self,
        request: &mut reqwest::Request,
        service: &str,
        credentials: &CredentialRecord,
    ) -> Result<(), Error>;
}
