//! Scripted in-process host for transport and facade tests.
//!
//! Listens on `127.0.0.1:<random>` from its own thread and runtime. Every
//! inbound envelope is recorded and passed to a responder that returns the
//! frames to send back. Connections are accepted one after another, so a
//! client can reconnect after the host drops it.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Frame the responder wants written back.
pub enum HostFrame {
    Text(Value),
    /// Close the current connection after the preceding frames.
    Close,
}

enum Control {
    Push(Value),
    DropConnection,
    Shutdown,
}

type Responder = Box<dyn FnMut(&Value) -> Vec<HostFrame> + Send>;

/// Build a reply envelope answering `envelope`.
pub fn reply_to(envelope: &Value, result: Value) -> Value {
    json!({ "result": result, "id": envelope["id"].clone() })
}

pub struct FakeHost {
    port: u16,
    received: Arc<Mutex<Vec<Value>>>,
    control: mpsc::UnboundedSender<Control>,
    thread: Option<JoinHandle<()>>,
}

impl FakeHost {
    pub fn start(responder: impl FnMut(&Value) -> Vec<HostFrame> + Send + 'static) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind fake host");
        listener
            .set_nonblocking(true)
            .expect("nonblocking fake host listener");
        let port = listener.local_addr().expect("fake host address").port();

        let received = Arc::new(Mutex::new(Vec::new()));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let recorded = Arc::clone(&received);
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("fake host runtime");
            runtime.block_on(serve(listener, Box::new(responder), recorded, control_rx));
        });

        Self {
            port,
            received,
            control: control_tx,
            thread: Some(thread),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().expect("received lock").clone()
    }

    /// Poll until at least `count` envelopes arrived or the timeout passes.
    pub fn wait_for_received(&self, count: usize, timeout: Duration) -> Vec<Value> {
        let deadline = Instant::now() + timeout;
        loop {
            let received = self.received();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Send an unsolicited message on the current connection.
    pub fn push(&self, message: Value) {
        let _ = self.control.send(Control::Push(message));
    }

    /// Close the current connection but keep accepting new ones.
    pub fn drop_connection(&self) {
        let _ = self.control.send(Control::DropConnection);
    }

    /// Close the connection and stop listening.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

impl Drop for FakeHost {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn serve(
    listener: std::net::TcpListener,
    mut responder: Responder,
    received: Arc<Mutex<Vec<Value>>>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(_) => continue,
            },
            command = control.recv() => match command {
                Some(Control::Shutdown) | None => return,
                Some(_) => continue,
            },
        };
        let Ok(mut ws) = accept_async(stream).await else {
            continue;
        };

        loop {
            tokio::select! {
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(envelope) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        received.lock().expect("received lock").push(envelope.clone());

                        let mut close = false;
                        for frame in responder(&envelope) {
                            match frame {
                                HostFrame::Text(value) => {
                                    let _ = ws.send(Message::Text(value.to_string())).await;
                                }
                                HostFrame::Close => {
                                    close = true;
                                    break;
                                }
                            }
                        }
                        if close {
                            let _ = ws.close(None).await;
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                },
                command = control.recv() => match command {
                    Some(Control::Push(value)) => {
                        let _ = ws.send(Message::Text(value.to_string())).await;
                    }
                    Some(Control::DropConnection) => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    Some(Control::Shutdown) | None => {
                        let _ = ws.close(None).await;
                        return;
                    }
                },
            }
        }
    }
}
