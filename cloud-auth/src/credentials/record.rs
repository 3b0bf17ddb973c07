//! Credential records and the merge of per-call overrides over stored defaults.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::CredentialSignature;

/// Region used when neither the call nor the stored defaults name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Provider-level default credentials, typically loaded from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub region: Option<String>,
}

/// Credentials supplied with a single invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialOverrides {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub region: Option<String>,
}

/// Normalized credentials for one call.
///
/// Empty strings are treated as absent. An absent key pair means "use the
/// ambient/anonymous configuration" downstream.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    access_key_id: Option<String>,
    secret_access_key: Option<SecretString>,
    region: String,
}

impl CredentialRecord {
    /// Build a record, normalizing empty values and applying the region fallback.
    pub fn new(
        access_key_id: Option<String>,
        secret_access_key: Option<SecretString>,
        region: Option<String>,
    ) -> Self {
        Self {
            access_key_id: non_empty(access_key_id),
            secret_access_key: non_empty_secret(secret_access_key),
            region: non_empty(region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }

    /// A record without a key pair, bound to `region`.
    pub fn anonymous(region: &str) -> Self {
        Self::new(None, None, Some(region.to_string()))
    }

    pub fn access_key_id(&self) -> Option<&str> {
        self.access_key_id.as_deref()
    }

    pub fn secret_access_key(&self) -> Option<&SecretString> {
        self.secret_access_key.as_ref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// The access key pair, only when both halves are present.
    ///
    /// A lone key id or a lone secret is never handed to a client.
    pub fn key_pair(&self) -> Option<(&str, &SecretString)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret)),
            _ => None,
        }
    }

    /// Comparable identity of these credentials.
    pub fn signature(&self) -> CredentialSignature {
        CredentialSignature::of(self)
    }

    /// Same credentials with a different region.
    pub fn with_region(&self, region: &str) -> Self {
        Self::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            Some(region.to_string()),
        )
    }
}

/// Merge call-level overrides over stored defaults.
///
/// For each field the non-empty override wins, then the stored default; the
/// region finally falls back to [`DEFAULT_REGION`]. Never fails.
pub fn resolve(stored: &StoredCredentials, overrides: &CredentialOverrides) -> CredentialRecord {
    let access_key_id = non_empty(overrides.access_key_id.clone())
        .or_else(|| non_empty(stored.access_key_id.clone()));
    let secret_access_key = non_empty_secret(overrides.secret_access_key.clone())
        .or_else(|| non_empty_secret(stored.secret_access_key.clone()));
    let region = non_empty(overrides.region.clone()).or_else(|| non_empty(stored.region.clone()));

    CredentialRecord::new(access_key_id, secret_access_key, region)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty_secret(value: Option<SecretString>) -> Option<SecretString> {
    value.filter(|v| !v.expose_secret().trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> Option<SecretString> {
        Some(SecretString::new(value.to_string()))
    }

    #[test]
    fn test_override_wins_over_stored_default() {
        let stored = StoredCredentials {
            access_key_id: Some("STORED".to_string()),
            secret_access_key: secret("stored-secret"),
            region: Some("eu-west-1".to_string()),
        };
        let overrides = CredentialOverrides {
            access_key_id: Some("CALL".to_string()),
            secret_access_key: secret("call-secret"),
            region: Some("ap-northeast-1".to_string()),
        };

        let record = resolve(&stored, &overrides);

        assert_eq!(record.access_key_id(), Some("CALL"));
        assert_eq!(
            record.secret_access_key().map(|s| s.expose_secret().as_str()),
            Some("call-secret")
        );
        assert_eq!(record.region(), "ap-northeast-1");
    }

    #[test]
    fn test_stored_region_used_without_override() {
        let stored = StoredCredentials {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };

        let record = resolve(&stored, &CredentialOverrides::default());
        assert_eq!(record.region(), "eu-west-1");
    }

    #[test]
    fn test_region_falls_back_to_default() {
        let record = resolve(&StoredCredentials::default(), &CredentialOverrides::default());
        assert_eq!(record.region(), DEFAULT_REGION);
    }

    #[test]
    fn test_empty_override_falls_through_to_stored() {
        let stored = StoredCredentials {
            access_key_id: Some("STORED".to_string()),
            secret_access_key: secret("stored-secret"),
            region: Some("eu-west-1".to_string()),
        };
        let overrides = CredentialOverrides {
            access_key_id: Some(String::new()),
            secret_access_key: secret("  "),
            region: Some(String::new()),
        };

        let record = resolve(&stored, &overrides);
        assert_eq!(record.access_key_id(), Some("STORED"));
        assert_eq!(record.region(), "eu-west-1");
        assert!(record.key_pair().is_some());
    }

    #[test]
    fn test_partial_key_pair_is_not_exposed() {
        let overrides = CredentialOverrides {
            access_key_id: Some("AKIDONLY".to_string()),
            ..Default::default()
        };

        let record = resolve(&StoredCredentials::default(), &overrides);
        assert_eq!(record.access_key_id(), Some("AKIDONLY"));
        assert!(record.key_pair().is_none());
    }

    #[test]
    fn test_debug_output_redacts_secret() {
        let record = CredentialRecord::new(
            Some("AKID".to_string()),
            secret("super-secret-value"),
            None,
        );
        let debug = format!("{:?}", record);
        assert!(!debug.contains("super-secret-value"));
    }
}
