//! Owner-thread websocket client for the host script.
//!
//! All bookkeeping happens on the thread that owns the client. Blocking
//! waits pump the socket thread's event channel, so replies, host
//! notifications and the wait itself share one code path. Handlers run with
//! no internal borrow held and may issue nested calls.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde_json::Value;
use tkpainter_shared::{HostNotification, HostRequest, InboundEvent, OutboundEnvelope};

use super::connection::{set_connection_state, ConnectionState};
use super::core::{PendingCall, PendingCalls, RetryState};
use super::error::TransportError;
use super::io::{IoHandle, TransportEvent};
use super::shared::{
    route_inbound, RoutedMessage, DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_WAIT,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_WAIT,
};
use crate::infrastructure::correlation::CorrelationId;

pub type EventHandler = Rc<dyn Fn(&InboundEvent)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub url: String,
    pub call_timeout: Duration,
    /// How long `notify` and `call` wait for a connection attempt to settle.
    pub connect_wait: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_wait: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            connect_wait: DEFAULT_CONNECT_WAIT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_wait: DEFAULT_RECONNECT_WAIT,
        }
    }
}

/// What the receive path did with one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Resolved,
    Unmatched,
    Dispatched,
    Malformed,
}

pub struct TransportClient {
    config: TransportConfig,
    state: Arc<AtomicU8>,
    session: Arc<AtomicU64>,
    io: RefCell<Option<IoHandle>>,
    pending: RefCell<PendingCalls>,
    on_event: RefCell<Option<EventHandler>>,
    last_lost_session: Cell<u64>,
    retries_exhausted: Cell<bool>,
    closed: Cell<bool>,
}

impl TransportClient {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            state: Arc::new(AtomicU8::new(ConnectionState::Unconnected.to_u8())),
            session: Arc::new(AtomicU64::new(0)),
            io: RefCell::new(None),
            pending: RefCell::new(PendingCalls::default()),
            on_event: RefCell::new(None),
            last_lost_session: Cell::new(0),
            retries_exhausted: Cell::new(false),
            closed: Cell::new(false),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn set_on_event(&self, handler: EventHandler) {
        *self.on_event.borrow_mut() = Some(handler);
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Session number of the most recent connection (0 before the first).
    pub fn current_session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    /// True once the connection that was current at `session` is gone for good
    /// or has been replaced.
    pub fn lost_since(&self, session: u64) -> bool {
        self.closed.get() || self.retries_exhausted.get() || self.last_lost_session.get() >= session
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retries_exhausted.get()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Start connecting in the background. Outcome shows up in `state()`.
    pub fn connect(&self) {
        if self.io.borrow().is_some() && !self.retries_exhausted.get() {
            tracing::debug!("Connect requested while a connection is already managed");
            return;
        }
        // Drop a finished socket thread before starting a new one.
        let finished = self.io.borrow_mut().take();
        drop(finished);

        self.closed.set(false);
        self.retries_exhausted.set(false);

        let retry = RetryState::new(self.config.max_reconnect_attempts, self.config.reconnect_wait);
        match IoHandle::spawn(
            self.config.url.clone(),
            retry,
            Arc::clone(&self.state),
            Arc::clone(&self.session),
        ) {
            Ok(io) => {
                tracing::info!("Connecting to host at {}", self.config.url);
                *self.io.borrow_mut() = Some(io);
            }
            Err(e) => {
                tracing::error!("Failed to start socket thread: {}", e);
                set_connection_state(&self.state, ConnectionState::Error);
            }
        }
    }

    /// Wait for a pending connection attempt to settle.
    pub fn wait_for_connection(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump_until(deadline, || self.state() != ConnectionState::Connecting);
        self.state() == ConnectionState::Connected
    }

    /// Fire-and-forget. Silently dropped unless connected.
    pub fn notify(&self, notification: &HostNotification) -> Option<CorrelationId> {
        if self.state() == ConnectionState::Connecting {
            self.wait_for_connection(self.config.connect_wait);
        }

        let method = notification.method();
        let state = self.state();
        if state != ConnectionState::Connected {
            tracing::debug!(method, ?state, "Dropping notification, not connected");
            return None;
        }

        let id = CorrelationId::new();
        let envelope = OutboundEnvelope::new(method, notification.params(), id.to_string());
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(method, "Failed to encode notification: {}", e);
                return None;
            }
        };

        if self.send_text(text) {
            tracing::debug!(request_id = %id, method, "Sent notification");
            Some(id)
        } else {
            None
        }
    }

    /// Call-and-wait with the configured timeout.
    pub fn call(&self, request: &HostRequest) -> Result<Value, TransportError> {
        self.call_with_timeout(request, self.config.call_timeout)
    }

    pub fn call_with_timeout(
        &self,
        request: &HostRequest,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.call_in_session(request, timeout).map(|(result, _)| result)
    }

    /// Like `call_with_timeout`, also returning the session the reply came on.
    pub fn call_in_session(
        &self,
        request: &HostRequest,
        timeout: Duration,
    ) -> Result<(Value, u64), TransportError> {
        let method = request.method();
        let deadline = Instant::now() + timeout;

        if self.state() == ConnectionState::Connecting {
            self.pump_until(deadline, || self.state() != ConnectionState::Connecting);
        }
        if self.state() != ConnectionState::Connected {
            tracing::warn!(method, state = ?self.state(), "Call issued while not connected");
            return Err(TransportError::ConnectionLost);
        }

        let id = self.fresh_id();
        let envelope = OutboundEnvelope::new(method, request.params(), id.clone());
        let text = envelope.to_json().map_err(|e| TransportError::Encode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        let session = self.current_session();
        let (call, completion) = PendingCall::new(method, deadline, session);
        let registered = self.pending.borrow_mut().insert(id.clone(), call);
        debug_assert!(registered);

        tracing::debug!(request_id = %id, method, "Sending call");
        if !self.send_text(text) {
            self.pending.borrow_mut().remove(&id);
            return Err(TransportError::ConnectionLost);
        }

        self.pump_until(deadline, || completion.is_done());

        match completion.take() {
            Some(outcome) => outcome.map(|result| (result, session)),
            None => {
                self.pending.borrow_mut().remove(&id);
                tracing::warn!(request_id = %id, method, "Call timed out");
                Err(TransportError::Timeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Process transport events until `done` holds or the deadline passes.
    ///
    /// Returns the final value of `done`.
    pub fn pump_until(&self, deadline: Instant, done: impl FnMut() -> bool) -> bool {
        let events = self.io.borrow().as_ref().map(|io| io.events().clone());
        self.pump_events(events.as_ref(), deadline, done)
    }

    fn pump_events(
        &self,
        events: Option<&Receiver<TransportEvent>>,
        deadline: Instant,
        mut done: impl FnMut() -> bool,
    ) -> bool {
        loop {
            self.pending.borrow_mut().expire(Instant::now());
            if done() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let Some(events) = events else {
                std::thread::sleep(deadline - now);
                return done();
            };

            match events.recv_timeout(deadline - now) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Socket thread has exited; nothing else will arrive.
                    if !self.closed.get() && !self.retries_exhausted.get() {
                        tracing::error!("Socket thread exited without closing");
                        self.handle_event(TransportEvent::RetriesExhausted);
                    }
                    self.pending.borrow_mut().expire(Instant::now());
                    if done() {
                        return true;
                    }
                    std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    return done();
                }
            }
        }
    }

    /// Route one inbound text frame.
    pub fn on_receive(&self, raw: &str) -> ReceiveOutcome {
        match route_inbound(raw) {
            Ok(RoutedMessage::Reply { id, result }) => {
                let resolved = self.pending.borrow_mut().resolve(&id, result);
                if resolved.is_some() {
                    ReceiveOutcome::Resolved
                } else {
                    tracing::warn!(request_id = %id, "Dropping reply with no pending call");
                    ReceiveOutcome::Unmatched
                }
            }
            Ok(RoutedMessage::Event(event)) => {
                self.dispatch(&event);
                ReceiveOutcome::Dispatched
            }
            Err(e) => match InboundEvent::rejected(&e) {
                Some(event) => {
                    tracing::warn!(method = event.name(), "Rejected host event: {}", e);
                    self.dispatch(&event);
                    ReceiveOutcome::Malformed
                }
                None => {
                    tracing::warn!("Dropping malformed envelope: {}", e);
                    ReceiveOutcome::Malformed
                }
            },
        }
    }

    /// Explicit shutdown. No reconnect; pending calls fail.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }

        let io = self.io.borrow_mut().take();
        if let Some(mut io) = io {
            set_connection_state(&self.state, ConnectionState::Closing);
            io.shutdown();
        }

        let failed = self.pending.borrow_mut().fail_all();
        if failed > 0 {
            tracing::debug!("Failed {} pending calls on close", failed);
        }
        set_connection_state(&self.state, ConnectionState::Unconnected);
        tracing::info!("Host connection closed");
    }

    fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { session } => {
                tracing::debug!(session, "Session started");
            }
            TransportEvent::Text { text, .. } => {
                self.on_receive(&text);
            }
            TransportEvent::ConnectionLost { session, reason } => {
                self.last_lost_session
                    .set(self.last_lost_session.get().max(session));
                let failed = self.pending.borrow_mut().fail_session(session);
                if failed > 0 {
                    tracing::warn!(session, "Failed {} pending calls: {}", failed, reason);
                }
            }
            TransportEvent::Reconnecting {
                attempt,
                max_attempts,
            } => {
                tracing::debug!(attempt, max_attempts, "Reconnecting");
            }
            TransportEvent::RetriesExhausted => {
                self.retries_exhausted.set(true);
                self.pending.borrow_mut().fail_all();
                tracing::error!("Host connection lost for good");
                self.dispatch(&InboundEvent::Quit);
            }
            TransportEvent::Closed => {
                tracing::debug!("Socket thread closed");
            }
        }
    }

    fn dispatch(&self, event: &InboundEvent) {
        let handler = self.on_event.borrow().clone();
        match handler {
            Some(handler) => handler(event),
            None => tracing::debug!(method = event.name(), "No handler for inbound event"),
        }
    }

    fn send_text(&self, text: String) -> bool {
        let sent = self
            .io
            .borrow()
            .as_ref()
            .map(|io| io.send(text))
            .unwrap_or(false);
        if !sent {
            tracing::warn!("Socket thread is gone, frame dropped");
        }
        sent
    }

    fn fresh_id(&self) -> String {
        let pending = self.pending.borrow();
        CorrelationId::unused(|id| pending.contains(id))
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::fake_host::{reply_to, FakeHost, HostFrame};
    use serde_json::json;

    fn config_for(host: &FakeHost) -> TransportConfig {
        TransportConfig {
            url: host.url(),
            call_timeout: Duration::from_secs(2),
            connect_wait: Duration::from_secs(5),
            max_reconnect_attempts: 2,
            reconnect_wait: Duration::from_millis(50),
        }
    }

    fn connected_client(host: &FakeHost) -> TransportClient {
        let client = TransportClient::new(config_for(host));
        client.connect();
        assert!(client.wait_for_connection(Duration::from_secs(5)));
        client
    }

    #[test]
    fn call_returns_matching_result() {
        let host = FakeHost::start(|envelope| {
            vec![HostFrame::Text(reply_to(envelope, json!({"painter": "10.2.0"})))]
        });
        let client = connected_client(&host);

        let result = client.call(&HostRequest::GetVersion).unwrap();

        assert_eq!(result, json!({"painter": "10.2.0"}));
        assert_eq!(client.pending_len(), 0);

        let received = host.received();
        assert_eq!(received[0]["jsonrpc"], "2.0");
        assert_eq!(received[0]["method"], "GET_VERSION");
        assert!(received[0]["id"].is_string());
    }

    #[test]
    fn unrelated_traffic_during_wait_is_dispatched() {
        let host = FakeHost::start(|envelope| {
            vec![
                HostFrame::Text(json!({"result": "stale", "id": "not-ours"})),
                HostFrame::Text(json!({"method": "SOMETHING_NEW", "params": {"n": 1}})),
                HostFrame::Text(reply_to(envelope, json!(true))),
            ]
        });
        let client = connected_client(&host);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        client.set_on_event(Rc::new(move |event: &InboundEvent| {
            sink.borrow_mut().push(event.name().to_string());
        }));

        let result = client.call(&HostRequest::SaveProject).unwrap();

        assert_eq!(result, json!(true));
        assert_eq!(*seen.borrow(), vec!["SOMETHING_NEW".to_string()]);
    }

    #[test]
    fn nested_call_from_handler_resolves_by_id() {
        // Answers the outer call only after the nested one, with both replies
        // arriving back to back.
        let mut outer_id: Option<Value> = None;
        let host = FakeHost::start(move |envelope| match envelope["method"].as_str() {
            Some("OPEN_PROJECT") => {
                outer_id = Some(envelope["id"].clone());
                vec![HostFrame::Text(
                    json!({"method": "PROJECT_OPENED", "params": {"path": "/p.spp"}}),
                )]
            }
            Some("GET_VERSION") => {
                let mut frames = vec![HostFrame::Text(reply_to(envelope, json!("inner")))];
                if let Some(id) = outer_id.take() {
                    frames.push(HostFrame::Text(json!({"result": "outer", "id": id})));
                }
                frames
            }
            _ => vec![],
        });

        let client = Rc::new(connected_client(&host));
        let inner_result = Rc::new(RefCell::new(None));
        let weak = Rc::downgrade(&client);
        let slot = Rc::clone(&inner_result);
        client.set_on_event(Rc::new(move |event: &InboundEvent| {
            if let (InboundEvent::ProjectOpened { .. }, Some(client)) = (event, weak.upgrade()) {
                *slot.borrow_mut() = Some(client.call(&HostRequest::GetVersion));
            }
        }));

        let outer = client.call(&HostRequest::OpenProject {
            path: "/p.spp".to_string(),
        });

        assert_eq!(outer, Ok(json!("outer")));
        assert_eq!(*inner_result.borrow(), Some(Ok(json!("inner"))));
        assert_eq!(client.pending_len(), 0);
    }

    #[test]
    fn call_without_reply_times_out_and_late_reply_is_dropped() {
        let host = FakeHost::start(|_| vec![]);
        let client = connected_client(&host);

        let started = Instant::now();
        let err = client
            .call_with_timeout(&HostRequest::CloseProject, Duration::from_millis(200))
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout { ref method, .. } if method == "CLOSE_PROJECT"));
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(client.pending_len(), 0);

        let id = host.received()[0]["id"].clone();
        let late = json!({"result": true, "id": id}).to_string();
        assert_eq!(client.on_receive(&late), ReceiveOutcome::Unmatched);
    }

    #[test]
    fn notify_never_fails_when_unconnected() {
        let client = TransportClient::new(TransportConfig::new("ws://127.0.0.1:9"));
        let sent = client.notify(&HostNotification::Log {
            level: tkpainter_shared::LogLevel::Info,
            message: "hello".to_string(),
        });
        assert!(sent.is_none());
        assert_eq!(client.state(), ConnectionState::Unconnected);
    }

    #[test]
    fn notify_sends_envelope_with_id() {
        let host = FakeHost::start(|_| vec![]);
        let client = connected_client(&host);

        let id = client
            .notify(&HostNotification::ToggleDebugLogging { enabled: true })
            .unwrap();

        let received = host.wait_for_received(1, Duration::from_secs(2));
        assert_eq!(received[0]["method"], "TOGGLE_DEBUG_LOGGING");
        assert_eq!(received[0]["params"], json!({"enabled": true}));
        assert_eq!(received[0]["id"], id.to_string());
    }

    #[test]
    fn connection_loss_fails_pending_call_promptly() {
        let host = FakeHost::start(|_| vec![HostFrame::Close]);
        let client = connected_client(&host);

        let started = Instant::now();
        let err = client
            .call_with_timeout(&HostRequest::SaveProject, Duration::from_secs(5))
            .unwrap_err();

        assert_eq!(err, TransportError::ConnectionLost);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(client.pending_len(), 0);
    }

    #[test]
    fn client_reconnects_after_host_drops_connection() {
        let host = FakeHost::start(|envelope| match envelope["method"].as_str() {
            Some("SAVE_PROJECT") => vec![HostFrame::Close],
            _ => vec![HostFrame::Text(reply_to(envelope, json!("ok")))],
        });
        let client = connected_client(&host);
        let first_session = client.current_session();

        assert!(client.call(&HostRequest::SaveProject).is_err());
        assert!(client.lost_since(first_session));

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(client.pump_until(deadline, || client.state() == ConnectionState::Connected));

        assert!(client.current_session() > first_session);
        assert_eq!(client.call(&HostRequest::GetVersion), Ok(json!("ok")));
    }

    #[test]
    fn exhausted_retries_raise_quit() {
        let host = FakeHost::start(|_| vec![]);
        let client = connected_client(&host);
        let quit_seen = Rc::new(Cell::new(false));
        let flag = Rc::clone(&quit_seen);
        client.set_on_event(Rc::new(move |event: &InboundEvent| {
            if *event == InboundEvent::Quit {
                flag.set(true);
            }
        }));

        host.shutdown();

        let deadline = Instant::now() + Duration::from_secs(10);
        assert!(client.pump_until(deadline, || quit_seen.get()));
        assert!(client.retries_exhausted());
        assert_eq!(
            client.call(&HostRequest::GetVersion),
            Err(TransportError::ConnectionLost)
        );
    }

    #[test]
    fn close_ends_unconnected_and_refuses_work() {
        let host = FakeHost::start(|envelope| vec![HostFrame::Text(reply_to(envelope, json!(1)))]);
        let client = connected_client(&host);

        client.close();

        assert_eq!(client.state(), ConnectionState::Unconnected);
        assert!(client.notify(&HostNotification::engine_ready()).is_none());
        assert_eq!(
            client.call(&HostRequest::GetVersion),
            Err(TransportError::ConnectionLost)
        );
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let client = TransportClient::new(TransportConfig::new("ws://127.0.0.1:9"));
        assert_eq!(client.on_receive("{oops"), ReceiveOutcome::Malformed);
        assert_eq!(client.on_receive(r#"{"id": "x"}"#), ReceiveOutcome::Malformed);
    }

    #[test]
    fn notification_reaches_handler() {
        let client = TransportClient::new(TransportConfig::new("ws://127.0.0.1:9"));
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        client.set_on_event(Rc::new(move |event: &InboundEvent| {
            *slot.borrow_mut() = Some(event.clone());
        }));

        let outcome = client.on_receive(r#"{"method": "DISPLAY_MENU"}"#);

        assert_eq!(outcome, ReceiveOutcome::Dispatched);
        assert_eq!(
            *seen.borrow(),
            Some(InboundEvent::DisplayMenu {
                clicked_position: None
            })
        );
    }

    #[test]
    fn host_side_drop_starts_new_session() {
        let host = FakeHost::start(|envelope| vec![HostFrame::Text(reply_to(envelope, json!("ok")))]);
        let client = connected_client(&host);
        let first_session = client.current_session();

        host.drop_connection();

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(client.pump_until(deadline, || {
            client.lost_since(first_session)
                && client.current_session() > first_session
                && client.state() == ConnectionState::Connected
        }));
        assert_eq!(client.call(&HostRequest::GetVersion), Ok(json!("ok")));
    }

    #[test]
    fn socket_thread_exit_fails_calls_and_raises_quit_once() {
        let client = TransportClient::new(TransportConfig::new("ws://127.0.0.1:9"));
        let quits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&quits);
        client.set_on_event(Rc::new(move |event: &InboundEvent| {
            if *event == InboundEvent::Quit {
                counter.set(counter.get() + 1);
            }
        }));

        let deadline = Instant::now() + Duration::from_secs(5);
        let (call, completion) = PendingCall::new("SAVE_PROJECT", deadline, 1);
        client.pending.borrow_mut().insert("abc".to_string(), call);
        let (sender, events) = crossbeam_channel::unbounded::<TransportEvent>();
        drop(sender);

        let started = Instant::now();
        assert!(client.pump_events(Some(&events), deadline, || completion.is_done()));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(completion.take(), Some(Err(TransportError::ConnectionLost)));
        assert!(client.lost_since(1));

        client.pump_events(
            Some(&events),
            Instant::now() + Duration::from_millis(50),
            || false,
        );
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn undecodable_known_event_reaches_handler_as_rejected() {
        let client = TransportClient::new(TransportConfig::new("ws://127.0.0.1:9"));
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        client.set_on_event(Rc::new(move |event: &InboundEvent| {
            *slot.borrow_mut() = Some(event.clone());
        }));

        let outcome = client.on_receive(
            r#"{"method": "EXPORT_FINISHED", "params": {"map_infos": {"body": {"baseColor": 7}}}}"#,
        );

        assert_eq!(outcome, ReceiveOutcome::Malformed);
        assert!(matches!(
            &*seen.borrow(),
            Some(InboundEvent::Rejected { method, .. }) if method == "EXPORT_FINISHED"
        ));
    }
}
