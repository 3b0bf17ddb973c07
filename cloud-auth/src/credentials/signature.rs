//! Comparable identity of a credential record.

use std::fmt;

use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use super::CredentialRecord;

/// Identity of (access key id, secret access key, region), used only to detect
/// when cached clients must be rebuilt.
///
/// The secret is kept as a SHA-256 digest so the lease does not hold a second
/// plaintext copy. Equality over the digest is equality over the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSignature {
    access_key_id: Option<String>,
    secret_digest: Option<[u8; 32]>,
    region: String,
}

impl CredentialSignature {
    pub fn of(record: &CredentialRecord) -> Self {
        Self {
            access_key_id: record.access_key_id().map(str::to_string),
            secret_digest: record
                .secret_access_key()
                .map(|secret| Sha256::digest(secret.expose_secret().as_bytes()).into()),
            region: record.region().to_string(),
        }
    }
}

impl fmt::Debug for CredentialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialSignature([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn record(id: &str, secret: &str, region: &str) -> CredentialRecord {
        CredentialRecord::new(
            Some(id.to_string()),
            Some(SecretString::new(secret.to_string())),
            Some(region.to_string()),
        )
    }

    #[test]
    fn test_identical_credentials_share_signature() {
        assert_eq!(
            record("AKID", "secret", "us-east-1").signature(),
            record("AKID", "secret", "us-east-1").signature()
        );
    }

    #[test]
    fn test_any_component_change_alters_signature() {
        let base = record("AKID", "secret", "us-east-1").signature();
        assert_ne!(base, record("OTHER", "secret", "us-east-1").signature());
        assert_ne!(base, record("AKID", "rotated", "us-east-1").signature());
        assert_ne!(base, record("AKID", "secret", "eu-west-1").signature());
    }

    #[test]
    fn test_debug_does_not_leak_identity() {
        let signature = record("AKIDVISIBLE", "secret", "us-east-1").signature();
        assert!(!format!("{:?}", signature).contains("AKIDVISIBLE"));
    }
}
