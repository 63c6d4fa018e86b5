//! Websocket transport to the host-side script.
//!
//! - `core` - pending-call table and retry counter (no runtime)
//! - `io` - socket thread running a current-thread tokio runtime
//! - `client` - owner-thread client: notify, call, pump, receive routing

pub mod client;
pub mod connection;
pub mod core;
pub mod error;
pub mod io;
pub mod shared;

pub use client::{EventHandler, ReceiveOutcome, TransportClient, TransportConfig};
pub use connection::ConnectionState;
pub use error::TransportError;
