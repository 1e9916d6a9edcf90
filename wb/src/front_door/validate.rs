//! Envelope validation
//!
//! Checks run in a fixed order: JSON object, required string fields,
//! protocol version, message type, payload shape. The first failure wins.

use serde_json::{Map, Value, json};

use crate::protocol::{Envelope, ErrorCode, MessageType, PROTOCOL_VERSION};

const REQUIRED_FIELDS: [&str; 4] = ["protocol_version", "message_id", "type", "command"];

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Parse one frame into an envelope, or build the `error_response` to send back
///
/// The error echoes `message_id` and `command` whenever they can be
/// recovered from the frame.
pub fn parse_envelope(frame: &[u8]) -> Result<Envelope, Envelope> {
    let value: Value = serde_json::from_slice(frame).map_err(|e| {
        Envelope::error(
            "",
            "",
            ErrorCode::InvalidMessageFormat,
            format!("Frame is not valid JSON: {e}"),
        )
    })?;

    let Value::Object(obj) = value else {
        return Err(Envelope::error(
            "",
            "",
            ErrorCode::InvalidMessageFormat,
            "Message must be a JSON object",
        ));
    };

    let message_id = string_field(&obj, "message_id").unwrap_or_default().to_string();
    let command = string_field(&obj, "command").unwrap_or_default().to_string();
    let fail = |code: ErrorCode, msg: String| Envelope::error(message_id.clone(), command.clone(), code, msg);

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| string_field(&obj, f).is_none()) {
        return Err(fail(
            ErrorCode::InvalidMessageFormat,
            format!("Missing or non-string field: {missing}"),
        ));
    }

    let version = string_field(&obj, "protocol_version").unwrap_or_default();
    if version != PROTOCOL_VERSION {
        return Err(fail(
            ErrorCode::UnsupportedProtocolVersion,
            format!("Unsupported protocol version {version}, expected {PROTOCOL_VERSION}"),
        ));
    }

    let type_name = string_field(&obj, "type").unwrap_or_default();
    let Some(kind) = MessageType::parse(type_name) else {
        return Err(fail(
            ErrorCode::InvalidMessageType,
            format!("Invalid message type: {type_name}"),
        ));
    };

    let payload = match obj.get("payload") {
        None | Some(Value::Null) => json!({}),
        Some(Value::Object(p)) => Value::Object(p.clone()),
        Some(_) => {
            return Err(fail(
                ErrorCode::InvalidMessageFormat,
                "payload must be a JSON object".to_string(),
            ));
        }
    };

    Ok(Envelope {
        protocol_version: version.to_string(),
        message_id,
        kind,
        command,
        payload,
    })
}
