//! Sandboxed code interpreter: control plane for interpreters, data plane for
//! sessions and tool calls.
//!
//! Tool calls answer with a binary event stream. Each frame is
//!
//! ```text
//! total_len:u32 | headers_len:u32 | prelude_crc:u32 | headers | payload | message_crc:u32
//! ```
//!
//! with big-endian integers. `prelude_crc` covers the first eight bytes and
//! `message_crc` everything before it; both are CRC-32.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cloud_jobs::error::{protocol_error, remote_error, Error, ProtocolErrorKind, RemoteErrorKind};
use log::*;
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{missing_field, read_json, response_header, set_header, ApiClient, JSON_CONTENT_TYPE};
use crate::ports::code_interpreter::{CodeInterpreterApi, CreateCodeInterpreter};

const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";
const SESSION_HEADER: &str = "x-amzn-code-interpreter-session-id";
const PRELUDE_LEN: usize = 12;
const TRAILER_LEN: usize = 4;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCodeInterpreterRequest<'a> {
    name: &'a str,
    description: &'a str,
    network_configuration: NetworkConfiguration<'a>,
    client_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkConfiguration<'a> {
    network_mode: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCodeInterpreterResponse {
    #[serde(default)]
    code_interpreter_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    session_timeout_seconds: u64,
    client_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct InvokeToolRequest<'a> {
    name: &'a str,
    arguments: Value,
}

/// One decoded event-stream frame. Only string-valued headers are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMessage {
    pub headers: BTreeMap<String, String>,
    pub payload: Vec<u8>,
}

impl EventMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Split an event-stream body into frames.
pub fn decode_event_stream(mut bytes: &[u8]) -> Result<Vec<EventMessage>, Error> {
    let mut messages = Vec::new();

    while !bytes.is_empty() {
        if bytes.len() < PRELUDE_LEN + TRAILER_LEN {
            return Err(malformed("truncated event-stream prelude"));
        }
        let total_len = read_u32(&bytes[0..4]) as usize;
        let headers_len = read_u32(&bytes[4..8]) as usize;
        if total_len < PRELUDE_LEN + headers_len + TRAILER_LEN || total_len > bytes.len() {
            return Err(malformed("event-stream frame length is out of range"));
        }
        if crc32fast::hash(&bytes[0..8]) != read_u32(&bytes[8..PRELUDE_LEN]) {
            return Err(malformed("event-stream prelude checksum mismatch"));
        }
        let crc_start = total_len - TRAILER_LEN;
        if crc32fast::hash(&bytes[..crc_start]) != read_u32(&bytes[crc_start..total_len]) {
            return Err(malformed("event-stream message checksum mismatch"));
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = decode_headers(&bytes[PRELUDE_LEN..headers_end])?;
        let payload = bytes[headers_end..total_len - TRAILER_LEN].to_vec();
        messages.push(EventMessage { headers, payload });

        bytes = &bytes[total_len..];
    }

    Ok(messages)
}

fn decode_headers(mut bytes: &[u8]) -> Result<BTreeMap<String, String>, Error> {
    let mut headers = BTreeMap::new();

    while !bytes.is_empty() {
        let name_len = bytes[0] as usize;
        let name = take(&mut bytes, 1, name_len)?;
        let name = String::from_utf8_lossy(name).to_string();
        let value_type = take(&mut bytes, 0, 1)?[0];

        let fixed_len = match value_type {
            0 | 1 => Some(0),
            2 => Some(1),
            3 => Some(2),
            4 => Some(4),
            5 | 8 => Some(8),
            9 => Some(16),
            6 | 7 => None,
            other => return Err(malformed(&format!("unknown event header type {}", other))),
        };

        match fixed_len {
            Some(len) => {
                take(&mut bytes, 0, len)?;
            }
            None => {
                let len_bytes = take(&mut bytes, 0, 2)?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let value = take(&mut bytes, 0, len)?;
                if value_type == 7 {
                    headers.insert(name, String::from_utf8_lossy(value).to_string());
                }
            }
        }
    }

    Ok(headers)
}

/// Skip `skip` bytes, then split off the next `len`.
fn take<'a>(bytes: &mut &'a [u8], skip: usize, len: usize) -> Result<&'a [u8], Error> {
    let end = skip + len;
    if bytes.len() < end {
        return Err(malformed("truncated event-stream header"));
    }
    let value = &bytes[skip..end];
    *bytes = &bytes[end..];
    Ok(value)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn malformed(message: &str) -> Error {
    protocol_error(ProtocolErrorKind::MalformedResponse, message)
}

/// The `result` document of a tool call response.
async fn tool_result(response: Response) -> Result<Value, Error> {
    let content_type = response_header(&response, "content-type").unwrap_or_default();
    if !content_type.starts_with(EVENT_STREAM_CONTENT_TYPE) {
        let mut body: Value = read_json(response).await?;
        if let Some(result) = body.get_mut("result") {
            return Ok(result.take());
        }
        return Ok(body);
    }

    let bytes = response.bytes().await?;
    for message in decode_event_stream(&bytes)? {
        match message.header(":message-type") {
            Some("exception") | Some("error") => {
                let kind = message
                    .header(":exception-type")
                    .or_else(|| message.header(":error-code"))
                    .unwrap_or("Exception");
                let detail: Value = serde_json::from_slice(&message.payload).unwrap_or_default();
                let text = detail
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                return Err(remote_error(
                    RemoteErrorKind::Service,
                    &format!("{}: {}", kind, text),
                ));
            }
            _ if message.header(":event-type") == Some("result") => {
                return Ok(serde_json::from_slice(&message.payload)?);
            }
            _ => trace!("Skipping event {:?}", message.header(":event-type")),
        }
    }

    Err(malformed("event stream ended without a result event"))
}

#[async_trait]
impl CodeInterpreterApi for ApiClient {
    async fn create_code_interpreter(&self, request: CreateCodeInterpreter) -> Result<String, Error> {
        let body = CreateCodeInterpreterRequest {
            name: &request.name,
            description: &request.description,
            network_configuration: NetworkConfiguration {
                network_mode: &request.network_mode,
            },
            client_token: Uuid::new_v4().to_string(),
        };

        let url = self.url(&["code-interpreters"])?;
        let response = self
            .send(self.json_request(Method::POST, url, JSON_CONTENT_TYPE, &body)?)
            .await?;
        let created: CreateCodeInterpreterResponse = read_json(response).await?;
        let id = created
            .code_interpreter_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing_field("codeInterpreterId"))?;

        info!("Created code interpreter {}", id);
        Ok(id)
    }

    async fn start_session(&self, code_interpreter_id: &str, timeout_secs: u64) -> Result<String, Error> {
        let body = StartSessionRequest {
            session_timeout_seconds: timeout_secs,
            client_token: Uuid::new_v4().to_string(),
        };

        let url = self.url(&["code-interpreters", code_interpreter_id, "sessions", "start"])?;
        let response = self
            .send(self.json_request(Method::PUT, url, JSON_CONTENT_TYPE, &body)?)
            .await?;
        let started: StartSessionResponse = read_json(response).await?;
        let session_id = started
            .session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing_field("sessionId"))?;

        info!("Started session {} on {}", session_id, code_interpreter_id);
        Ok(session_id)
    }

    async fn invoke_tool(
        &self,
        code_interpreter_id: &str,
        session_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, Error> {
        let body = InvokeToolRequest {
            name: tool_name,
            arguments,
        };

        let url = self.url(&["code-interpreters", code_interpreter_id, "tools", "invoke"])?;
        let mut request = self.json_request(Method::POST, url, JSON_CONTENT_TYPE, &body)?;
        set_header(&mut request, SESSION_HEADER, session_id)?;

        debug!("Running {} in session {}", tool_name, session_id);
        let response = self.send(request).await?;
        tool_result(response).await
    }
}
