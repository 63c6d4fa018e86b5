//! Runtime-free core of the host transport.
//!
//! Pending-call bookkeeping and the fixed-delay retry counter live here so
//! they can be tested without a socket. Everything in this module is owned
//! by a single thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::TransportError;

pub type CallOutcome = Result<Value, TransportError>;

/// Single-slot completion handle shared by a waiting call and its table entry.
#[derive(Clone, Default)]
pub struct Completion {
    slot: Rc<RefCell<Option<CallOutcome>>>,
}

impl Completion {
    /// Fill the slot. Returns false if it already held an outcome.
    pub fn complete(&self, outcome: CallOutcome) -> bool {
        let mut slot = self.slot.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        true
    }

    pub fn is_done(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn take(&self) -> Option<CallOutcome> {
        self.slot.borrow_mut().take()
    }
}

/// One call waiting for its reply.
pub struct PendingCall {
    pub method: &'static str,
    pub created_at: Instant,
    pub deadline: Instant,
    /// Connection session the request was written to.
    pub session: u64,
    completion: Completion,
}

impl PendingCall {
    pub fn new(method: &'static str, deadline: Instant, session: u64) -> (Self, Completion) {
        let completion = Completion::default();
        let call = Self {
            method,
            created_at: Instant::now(),
            deadline,
            session,
            completion: completion.clone(),
        };
        (call, completion)
    }
}

/// Tracks pending calls keyed by correlation id.
#[derive(Default)]
pub struct PendingCalls {
    inner: HashMap<String, PendingCall>,
}

impl PendingCalls {
    /// Insert a pending call. Refuses to replace a live entry.
    pub fn insert(&mut self, id: String, call: PendingCall) -> bool {
        if self.inner.contains_key(&id) {
            return false;
        }
        self.inner.insert(id, call);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PendingCall> {
        self.inner.remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Resolve and remove a pending call.
    ///
    /// Returns the method of the resolved call, or None for an unknown id.
    pub fn resolve(&mut self, id: &str, result: Value) -> Option<&'static str> {
        let call = self.inner.remove(id)?;
        call.completion.complete(Ok(result));
        tracing::debug!(
            request_id = %id,
            method = call.method,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            "Resolved pending call"
        );
        Some(call.method)
    }

    /// Fail every call written during `session` or earlier.
    pub fn fail_session(&mut self, session: u64) -> usize {
        let lost: Vec<String> = self
            .inner
            .iter()
            .filter(|(_, call)| call.session <= session)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &lost {
            if let Some(call) = self.inner.remove(id) {
                call.completion.complete(Err(TransportError::ConnectionLost));
            }
        }
        lost.len()
    }

    /// Time out every call whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> usize {
        let overdue: Vec<String> = self
            .inner
            .iter()
            .filter(|(_, call)| call.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &overdue {
            if let Some(call) = self.inner.remove(id) {
                tracing::warn!(request_id = %id, method = call.method, "Call timed out");
                call.completion.complete(Err(TransportError::Timeout {
                    method: call.method.to_string(),
                    timeout: call.deadline.saturating_duration_since(call.created_at),
                }));
            }
        }
        overdue.len()
    }

    pub fn fail_all(&mut self) -> usize {
        let count = self.inner.len();
        for (_, call) in self.inner.drain() {
            call.completion.complete(Err(TransportError::ConnectionLost));
        }
        count
    }
}

/// Fixed-delay retry counter for reconnects.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    wait: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, wait: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            wait,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Advance to the next attempt.
    ///
    /// Returns the delay to wait *before* performing this attempt.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.wait)
    }
}
