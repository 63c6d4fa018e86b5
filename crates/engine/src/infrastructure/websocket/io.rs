//! Socket thread.
//!
//! The websocket lives on a dedicated thread with a current-thread tokio
//! runtime. The owner thread talks to it through two channels: frames and
//! shutdown go in over a tokio mpsc, transport events come back over a
//! crossbeam channel the owner can block on with a timeout.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::connection::{set_connection_state, ConnectionState};
use super::core::RetryState;

/// Commands from the owner thread.
#[derive(Debug)]
pub enum IoCommand {
    Send(String),
    Shutdown,
}

/// Events delivered to the owner thread, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected { session: u64 },
    Text { session: u64, text: String },
    ConnectionLost { session: u64, reason: String },
    Reconnecting { attempt: u32, max_attempts: u32 },
    /// Retry budget spent; the thread has exited.
    RetriesExhausted,
    /// Explicit shutdown finished; the thread has exited.
    Closed,
}

enum SessionEnd {
    Lost(String),
    Shutdown,
}

/// Owner-side handle to the socket thread.
pub struct IoHandle {
    commands: mpsc::UnboundedSender<IoCommand>,
    events: Receiver<TransportEvent>,
    thread: Option<JoinHandle<()>>,
}

impl IoHandle {
    /// Start the socket thread; it begins connecting immediately.
    pub fn spawn(
        url: String,
        retry: RetryState,
        state: Arc<AtomicU8>,
        session: Arc<AtomicU64>,
    ) -> std::io::Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        set_connection_state(&state, ConnectionState::Connecting);
        let thread = std::thread::Builder::new()
            .name("tkpainter-ws".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        tracing::error!("Failed to create socket runtime: {}", e);
                        set_connection_state(&state, ConnectionState::Error);
                        let _ = event_tx.send(TransportEvent::RetriesExhausted);
                        return;
                    }
                };
                runtime.block_on(run(url, retry, state, session, command_rx, event_tx));
            })?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Queue a text frame. Returns false once the thread is gone.
    pub fn send(&self, text: String) -> bool {
        self.commands.send(IoCommand::Send(text)).is_ok()
    }

    pub fn events(&self) -> &Receiver<TransportEvent> {
        &self.events
    }

    /// Ask the thread to close the socket and wait for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(IoCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Socket thread panicked");
            }
        }
    }
}

impl Drop for IoHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    url: String,
    mut retry: RetryState,
    state: Arc<AtomicU8>,
    session_counter: Arc<AtomicU64>,
    mut commands: mpsc::UnboundedReceiver<IoCommand>,
    events: Sender<TransportEvent>,
) {
    let mut session = session_counter.load(Ordering::SeqCst);

    loop {
        set_connection_state(&state, ConnectionState::Connecting);

        let connecting = connect_async(url.as_str());
        tokio::pin!(connecting);
        let attempt = loop {
            tokio::select! {
                result = &mut connecting => break result,
                command = commands.recv() => match command {
                    Some(IoCommand::Send(_)) => {
                        tracing::debug!("Dropping frame queued while connecting");
                    }
                    Some(IoCommand::Shutdown) | None => {
                        finish(&state, &events);
                        return;
                    }
                },
            }
        };

        match attempt {
            Ok((ws_stream, _)) => {
                session += 1;
                retry.reset();

                // Frames queued for a previous session answer calls that already failed.
                while let Ok(command) = commands.try_recv() {
                    if let IoCommand::Shutdown = command {
                        finish(&state, &events);
                        return;
                    }
                }

                session_counter.store(session, Ordering::SeqCst);
                set_connection_state(&state, ConnectionState::Connected);
                tracing::info!(session, "Connected to host at {}", url);
                let _ = events.send(TransportEvent::Connected { session });

                let (mut write, mut read) = ws_stream.split();
                let end = loop {
                    tokio::select! {
                        command = commands.recv() => match command {
                            Some(IoCommand::Send(text)) => {
                                if let Err(e) = write.send(Message::Text(text)).await {
                                    break SessionEnd::Lost(e.to_string());
                                }
                            }
                            Some(IoCommand::Shutdown) | None => {
                                set_connection_state(&state, ConnectionState::Closing);
                                let _ = write.send(Message::Close(None)).await;
                                let _ = write.close().await;
                                break SessionEnd::Shutdown;
                            }
                        },
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                let _ = events.send(TransportEvent::Text { session, text });
                            }
                            Some(Ok(Message::Close(_))) => {
                                set_connection_state(&state, ConnectionState::Closing);
                                break SessionEnd::Lost("host closed the connection".to_string());
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break SessionEnd::Lost(e.to_string()),
                            None => break SessionEnd::Lost("stream ended".to_string()),
                        },
                    }
                };

                match end {
                    SessionEnd::Shutdown => {
                        finish(&state, &events);
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        tracing::warn!(session, "Connection lost: {}", reason);
                        set_connection_state(&state, ConnectionState::Error);
                        let _ = events.send(TransportEvent::ConnectionLost { session, reason });
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to connect to host at {}: {}", url, e);
                set_connection_state(&state, ConnectionState::Error);
            }
        }

        let Some(delay) = retry.next_delay_and_advance() else {
            tracing::error!("Max reconnection attempts reached, giving up");
            let _ = events.send(TransportEvent::RetriesExhausted);
            return;
        };
        tracing::info!(
            "Reconnection attempt {} of {}, waiting {}ms",
            retry.attempts(),
            retry.max_attempts(),
            delay.as_millis()
        );
        let _ = events.send(TransportEvent::Reconnecting {
            attempt: retry.attempts(),
            max_attempts: retry.max_attempts(),
        });

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    Some(IoCommand::Send(_)) => {
                        tracing::debug!("Dropping frame queued while disconnected");
                    }
                    Some(IoCommand::Shutdown) | None => {
                        finish(&state, &events);
                        return;
                    }
                },
            }
        }
    }
}

fn finish(state: &AtomicU8, events: &Sender<TransportEvent>) {
    set_connection_state(state, ConnectionState::Unconnected);
    let _ = events.send(TransportEvent::Closed);
}
