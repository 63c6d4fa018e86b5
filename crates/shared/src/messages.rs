//! Envelope framing for the host control channel.
//!
//! Outbound envelopes always carry `jsonrpc`, `method`, `params` and `id`.
//! Inbound text is either a reply (`result` key present, even when `null`)
//! or a notification (`method` key present). A reply wins when both keys
//! appear.

use serde::Serialize;
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request or notification.
///
/// Notifications use the same shape as requests; the host simply never
/// answers them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEnvelope {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: String,
}

impl OutboundEnvelope {
    pub fn new(method: impl Into<String>, params: Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound message with the reply/notification split already made.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Reply { id: String, result: Value },
    Notification { method: String, params: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Envelope is not a JSON object")]
    NotAnObject,
    #[error("Reply has no usable id")]
    InvalidReplyId,
    #[error("Notification method is not a string")]
    InvalidMethod,
    #[error("Envelope has neither result nor method")]
    Unrecognized,
    #[error("Invalid params for {method}: {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse one inbound text frame.
pub fn parse_envelope(text: &str) -> Result<InboundEnvelope, EnvelopeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(EnvelopeError::NotAnObject);
    };

    if let Some(result) = object.remove("result") {
        let id = reply_id(object.remove("id")).ok_or(EnvelopeError::InvalidReplyId)?;
        return Ok(InboundEnvelope::Reply { id, result });
    }

    match object.remove("method") {
        Some(Value::String(method)) => {
            let params = match object.remove("params") {
                None | Some(Value::Null) => Value::Object(Map::new()),
                Some(params) => params,
            };
            Ok(InboundEnvelope::Notification { method, params })
        }
        Some(_) => Err(EnvelopeError::InvalidMethod),
        None => Err(EnvelopeError::Unrecognized),
    }
}

/// Ids are compared as text; numeric ids use their decimal form.
fn reply_id(id: Option<Value>) -> Option<String> {
    match id? {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_envelope_has_all_fields() {
        let envelope = OutboundEnvelope::new("OPEN_PROJECT", json!({"path": "/a.spp"}), "abc");
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "OPEN_PROJECT",
                "params": {"path": "/a.spp"},
                "id": "abc",
            })
        );
    }

    #[test]
    fn reply_with_null_result_is_still_a_reply() {
        let parsed = parse_envelope(r#"{"result": null, "id": "x1"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundEnvelope::Reply {
                id: "x1".to_string(),
                result: Value::Null,
            }
        );
    }

    #[test]
    fn numeric_reply_id_is_compared_as_text() {
        let parsed = parse_envelope(r#"{"result": true, "id": 42}"#).unwrap();
        assert_eq!(
            parsed,
            InboundEnvelope::Reply {
                id: "42".to_string(),
                result: json!(true),
            }
        );
    }

    #[test]
    fn reply_wins_over_method() {
        let parsed = parse_envelope(r#"{"result": 1, "id": "a", "method": "QUIT"}"#).unwrap();
        assert!(matches!(parsed, InboundEnvelope::Reply { .. }));
    }

    #[test]
    fn reply_without_id_is_rejected() {
        let err = parse_envelope(r#"{"result": 1}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidReplyId));
    }

    #[test]
    fn notification_without_params_gets_empty_object() {
        let parsed = parse_envelope(r#"{"method": "QUIT"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundEnvelope::Notification {
                method: "QUIT".to_string(),
                params: json!({}),
            }
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_envelope("not json"),
            Err(EnvelopeError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_envelope("[1, 2]"),
            Err(EnvelopeError::NotAnObject)
        ));
        assert!(matches!(
            parse_envelope(r#"{"id": "a"}"#),
            Err(EnvelopeError::Unrecognized)
        ));
        assert!(matches!(
            parse_envelope(r#"{"method": 3}"#),
            Err(EnvelopeError::InvalidMethod)
        ));
    }
}
