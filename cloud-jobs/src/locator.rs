//! Remote artifact locators of the form `scheme://bucket/path`.

use std::fmt;
use std::str::FromStr;

use crate::error::{validation_error, Error, ValidationErrorKind};

/// A parsed `scheme://bucket/key` locator.
///
/// The key may be empty (`s3://bucket/` names a prefix), the bucket may not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    scheme: String,
    bucket: String,
    key: String,
}

impl ObjectLocator {
    pub fn s3(bucket: &str, key: &str) -> Self {
        Self {
            scheme: "s3".to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `name` to the key, inserting a `/` when the key does not end
    /// with one.
    pub fn join(&self, name: &str) -> Self {
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{}", self.key, name)
        } else {
            format!("{}/{}", self.key, name)
        };
        Self {
            key,
            ..self.clone()
        }
    }

    /// Parse and require the `s3` scheme.
    pub fn parse_s3(locator: &str) -> Result<Self, Error> {
        let parsed: ObjectLocator = locator.parse()?;
        if parsed.scheme != "s3" {
            return Err(validation_error(
                ValidationErrorKind::MalformedLocator,
                &format!("'{}' must start with s3://", locator),
            ));
        }
        Ok(parsed)
    }
}

impl FromStr for ObjectLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| {
            validation_error(
                ValidationErrorKind::MalformedLocator,
                &format!("'{}' is not a valid locator: {}", s, reason),
            )
        };

        let (scheme, rest) = s.split_once("://").ok_or_else(|| malformed("missing scheme"))?;
        if scheme.is_empty() {
            return Err(malformed("missing scheme"));
        }

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(malformed("missing bucket"));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}
