//! Infrastructure implementations.
//!
//! Contains the host transport, configuration, and port adapters.

pub mod correlation;
pub mod headless;
pub mod launch;
pub mod logging;
pub mod ports;
pub mod settings;
pub mod websocket;
