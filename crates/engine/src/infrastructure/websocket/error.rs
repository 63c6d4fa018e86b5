use std::time::Duration;

/// Failures surfaced to callers of the transport.
///
/// Malformed and unmatched inbound envelopes never show up here: they are
/// logged and dropped on the receive path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("{method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
    #[error("Connection to the host was lost")]
    ConnectionLost,
    #[error("Failed to encode {method}: {reason}")]
    Encode { method: String, reason: String },
}
