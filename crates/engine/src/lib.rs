//! tkpainter engine library.
//!
//! Bridges a pipeline toolkit to a texturing host over a local websocket.
//!
//! ## Structure
//!
//! - `use_cases/` - Host facade, event dispatch, callbacks, version checks
//! - `infrastructure/` - Transport, settings, logging, ports and adapters
//! - `app` - Engine composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Scripted websocket host for transport tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::{EngineError, EnginePorts, HostInfo, PainterEngine};
