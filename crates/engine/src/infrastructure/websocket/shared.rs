//! Defaults and inbound routing shared by the transport halves.

use std::time::Duration;

use serde_json::Value;
use tkpainter_shared::{parse_envelope, EnvelopeError, InboundEnvelope, InboundEvent};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_CONNECT_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_WAIT: Duration = Duration::from_secs(1);

/// Inbound envelope with notifications already decoded into events.
#[derive(Debug)]
pub enum RoutedMessage {
    Reply { id: String, result: Value },
    Event(InboundEvent),
}

pub fn route_inbound(text: &str) -> Result<RoutedMessage, EnvelopeError> {
    Ok(match parse_envelope(text)? {
        InboundEnvelope::Reply { id, result } => RoutedMessage::Reply { id, result },
        InboundEnvelope::Notification { method, params } => {
            RoutedMessage::Event(InboundEvent::decode(&method, params)?)
        }
    })
}
