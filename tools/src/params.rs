//! Typed access to a tool's JSON parameter map.
//!
//! Tool hosts hand parameters over loosely typed: booleans arrive as `"true"`,
//! numbers as strings, JSON payloads as strings. The accessors here accept
//! those forms and report anything else as a validation error naming the
//! parameter.

use cloud_auth::credentials::CredentialOverrides;
use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::output::ResultFormat;

pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const REGION: &str = "aws_region";
pub const RESULT_FORMAT: &str = "result_format";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolParameters {
    values: Map<String, Value>,
}

impl ToolParameters {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Parse a JSON object. Anything other than an object is rejected.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(values)) => Ok(Self { values }),
            Ok(_) => Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                "tool parameters must be a JSON object",
            )),
            Err(e) => Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                &format!("tool parameters are not valid JSON: {}", e),
            )),
        }
    }

    /// Builder-style setter, mostly for tests and embedding hosts.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// A trimmed, non-empty string value. Numbers are accepted as their text.
    pub fn str(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    pub fn require_str(&self, name: &str) -> Result<String, Error> {
        self.str(name).ok_or_else(|| {
            validation_error(
                ValidationErrorKind::MissingParameter,
                &format!("'{}' is required", name),
            )
        })
    }

    /// A boolean, or `None` when the parameter is absent or empty.
    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, Error> {
        let parsed = match self.values.get(name) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Bool(flag)) => Some(*flag),
            Some(Value::Number(number)) => match number.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(None),
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Some(_) => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| invalid(name, "must be a boolean"))
    }

    pub fn bool(&self, name: &str, default: bool) -> Result<bool, Error> {
        Ok(self.opt_bool(name)?.unwrap_or(default))
    }

    /// An integer, or `None` when the parameter is absent or empty.
    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, Error> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| {
                    number
                        .as_f64()
                        .filter(|value| value.fract() == 0.0)
                        .map(|value| value as i64)
                })
                .map(Some)
                .ok_or_else(|| invalid(name, "must be an integer")),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| invalid(name, "must be an integer")),
            Some(_) => Err(invalid(name, "must be an integer")),
        }
    }

    pub fn i64(&self, name: &str, default: i64) -> Result<i64, Error> {
        Ok(self.opt_i64(name)?.unwrap_or(default))
    }

    /// A JSON value given either inline or as a JSON-encoded string.
    pub fn json(&self, name: &str) -> Result<Option<Value>, Error> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| invalid(name, &format!("is not valid JSON: {}", e))),
            Some(value) => Ok(Some(value.clone())),
        }
    }

    /// Per-call credential overrides. Empty values count as absent.
    pub fn credential_overrides(&self) -> CredentialOverrides {
        CredentialOverrides {
            access_key_id: self.str(ACCESS_KEY_ID),
            secret_access_key: self.str(SECRET_ACCESS_KEY).map(SecretString::new),
            region: self.str(REGION),
        }
    }

    pub fn result_format(&self) -> Result<ResultFormat, Error> {
        match self.str(RESULT_FORMAT) {
            None => Ok(ResultFormat::default()),
            Some(raw) => raw.parse(),
        }
    }
}

fn invalid(name: &str, problem: &str) -> Error {
    validation_error(
        ValidationErrorKind::InvalidParameter,
        &format!("'{}' {}", name, problem),
    )
}
