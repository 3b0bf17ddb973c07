//! What a tool hands back to its host.

use std::fmt;
use std::str::FromStr;

use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use serde_json::Value;

/// One piece of tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolMessage {
    Text(String),
    Json(Value),
    Blob {
        bytes: Vec<u8>,
        mime_type: String,
        filename: Option<String>,
    },
}

/// Shape of a tool's result record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ResultFormat {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ResultFormat::Text),
            "json" => Ok(ResultFormat::Json),
            other => Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                &format!("unknown result_format '{}', expected text or json", other),
            )),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResultFormat::Text => write!(f, "text"),
            ResultFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResponse {
    pub messages: Vec<ToolMessage>,
    /// Set when the response describes a failure instead of a result.
    pub is_error: bool,
}

impl ToolResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_text(text)
    }

    /// A record rendered per `format`: the JSON value itself, or `summary`.
    pub fn record(format: ResultFormat, record: Value, summary: impl Into<String>) -> Self {
        match format {
            ResultFormat::Json => Self::new().with_json(record),
            ResultFormat::Text => Self::text(summary),
        }
    }

    /// Failure report for hosts that expect a result even when a call fails.
    pub fn failure(err: &Error) -> Self {
        Self {
            messages: vec![ToolMessage::Text(err.to_string())],
            is_error: true,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ToolMessage::Text(text.into()));
        self
    }

    pub fn with_json(mut self, value: Value) -> Self {
        self.messages.push(ToolMessage::Json(value));
        self
    }

    pub fn with_blob(mut self, bytes: Vec<u8>, mime_type: &str, filename: Option<&str>) -> Self {
        self.messages.push(ToolMessage::Blob {
            bytes,
            mime_type: mime_type.to_string(),
            filename: filename.map(str::to_string),
        });
        self
    }

    /// Every text message, joined by newlines.
    pub fn text_content(&self) -> String {
        self.messages
            .iter()
            .filter_map(|message| match message {
                ToolMessage::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn json_content(&self) -> Option<&Value> {
        self.messages.iter().find_map(|message| match message {
            ToolMessage::Json(value) => Some(value),
            _ => None,
        })
    }

    pub fn blobs(&self) -> impl Iterator<Item = &ToolMessage> {
        self.messages
            .iter()
            .filter(|message| matches!(message, ToolMessage::Blob { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<ResultFormat>().unwrap(), ResultFormat::Json);
        assert_eq!(" text ".parse::<ResultFormat>().unwrap(), ResultFormat::Text);
        assert!("xml".parse::<ResultFormat>().is_err());
    }

    #[test]
    fn test_record_follows_format() {
        let record = json!({"bucket_name": "media"});

        let as_text = ToolResponse::record(ResultFormat::Text, record.clone(), "created media");
        let as_json = ToolResponse::record(ResultFormat::Json, record.clone(), "created media");

        assert_eq!(as_text.text_content(), "created media");
        assert_eq!(as_text.json_content(), None);
        assert_eq!(as_json.json_content(), Some(&record));
        assert_eq!(as_json.text_content(), "");
    }

    #[test]
    fn test_failure_is_flagged() {
        let err = validation_error(ValidationErrorKind::MissingParameter, "'prompt' is required");

        let response = ToolResponse::failure(&err);

        assert!(response.is_error);
        assert!(response.text_content().contains("'prompt' is required"));
    }
}
