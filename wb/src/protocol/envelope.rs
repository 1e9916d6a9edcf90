//! Envelope type and payload helpers

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::ErrorCode;

/// Protocol version; peers must match exactly
pub const PROTOCOL_VERSION: &str = "1.0";

/// Envelope kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    ErrorResponse,
    Push,
}

impl MessageType {
    /// Parse the wire name of a message type
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "response" => Some(Self::Response),
            "error_response" => Some(Self::ErrorResponse),
            "push" => Some(Self::Push),
            _ => None,
        }
    }
}

/// The wire-level message wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub protocol_version: String,

    /// Generated by the sender of a request, echoed by its reply
    pub message_id: String,

    #[serde(rename = "type")]
    pub kind: MessageType,

    pub command: String,

    #[serde(default = "empty_object")]
    pub payload: Value,
}

fn empty_object() -> Value {
    json!({})
}

impl Envelope {
    fn new(message_id: impl Into<String>, kind: MessageType, command: impl Into<String>, payload: Value) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            message_id: message_id.into(),
            kind,
            command: command.into(),
            payload,
        }
    }

    /// A request with a caller-chosen message id
    pub fn request(message_id: impl Into<String>, command: impl Into<String>, payload: Value) -> Self {
        Self::new(message_id, MessageType::Request, command, payload)
    }

    /// A request with a fresh message id
    pub fn new_request(command: impl Into<String>, payload: Value) -> Self {
        Self::request(Uuid::now_v7().to_string(), command, payload)
    }

    /// A push; pushes are never answered so the id only aids logging
    pub fn push(command: impl Into<String>, payload: Value) -> Self {
        Self::new(Uuid::now_v7().to_string(), MessageType::Push, command, payload)
    }

    /// Reply to a request, typed by whether the payload reports success
    pub fn reply(message_id: impl Into<String>, command: impl Into<String>, payload: Value) -> Self {
        let kind = if payload_succeeded(&payload) {
            MessageType::Response
        } else {
            MessageType::ErrorResponse
        };
        Self::new(message_id, kind, command, payload)
    }

    /// An `error_response` carrying `{success: false, error, errorCode}`
    pub fn error(
        message_id: impl Into<String>,
        command: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::new(message_id, MessageType::ErrorResponse, command, error_payload(code, message))
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// The `errorCode` of a failure payload, if any
    pub fn error_code(&self) -> Option<&str> {
        self.payload.get("errorCode").and_then(Value::as_str)
    }
}

/// `{success: true, data}`
pub fn success_payload(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

/// `{success: false, error, errorCode}`
pub fn error_payload(code: ErrorCode, message: impl Into<String>) -> Value {
    json!({
        "success": false,
        "error": message.into(),
        "errorCode": code.as_str(),
    })
}

/// True when a payload carries `success: true`
pub fn payload_succeeded(payload: &Value) -> bool {
    payload.get("success").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let env = Envelope::request("msg-1", "search_workspace", json!({"query": "main"}));
        let json: Value = serde_json::from_slice(&env.to_bytes().unwrap()).unwrap();

        assert_eq!(json["protocol_version"], "1.0");
        assert_eq!(json["message_id"], "msg-1");
        assert_eq!(json["type"], "request");
        assert_eq!(json["command"], "search_workspace");
        assert_eq!(json["payload"]["query"], "main");
    }

    #[test]
    fn test_reply_picks_type_from_payload() {
        let ok = Envelope::reply("m", "get_file_tree", success_payload(json!([])));
        assert_eq!(ok.kind, MessageType::Response);

        let failed = Envelope::reply("m", "get_file_tree", error_payload(ErrorCode::NoResponses, "none"));
        assert_eq!(failed.kind, MessageType::ErrorResponse);
        assert_eq!(failed.error_code(), Some("NO_RESPONSES"));
    }

    #[test]
    fn test_missing_payload_defaults_to_object() {
        let raw = br#"{"protocol_version":"1.0","message_id":"1","type":"push","command":"snippet"}"#;
        let env = Envelope::from_slice(raw).unwrap();
        assert_eq!(env.payload, json!({}));
    }

    #[test]
    fn test_message_type_parse() {
        assert_eq!(MessageType::parse("error_response"), Some(MessageType::ErrorResponse));
        assert_eq!(MessageType::parse("notification"), None);
    }
}
