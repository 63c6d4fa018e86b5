//! Correlation ids pairing outbound envelopes with their replies.

use std::fmt;
use uuid::Uuid;

/// Random 128-bit id, written on the wire as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Fresh wire id for which `in_use` returns false.
    pub fn unused(in_use: impl Fn(&str) -> bool) -> String {
        loop {
            let id = Self::new().to_string();
            if !in_use(&id) {
                return id;
            }
            tracing::debug!(request_id = %id, "Correlation id collision, drawing again");
        }
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
