//! Test fixtures shared across the engine's unit tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::fake_host::{reply_to, FakeHost, HostFrame};
//!
//! let host = FakeHost::start(|envelope| vec![HostFrame::Text(reply_to(envelope, json!(true)))]);
//! ```

pub mod fake_host;
