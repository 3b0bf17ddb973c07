//! Credential resolution and rotation detection.
//!
//! A handler never talks to a service with "raw" parameters: it first merges
//! the per-call overrides over the stored defaults with [`resolve`], then uses
//! the resulting [`CredentialRecord`] both to build clients and to compute the
//! [`CredentialSignature`] its client lease compares against.

mod record;
mod signature;

pub use record::{resolve, CredentialOverrides, CredentialRecord, StoredCredentials, DEFAULT_REGION};
pub use signature::CredentialSignature;
