//! tkpainter Shared - wire vocabulary spoken with the host-side script.
//!
//! This crate contains everything both ends of the control channel agree on:
//! - JSON-RPC-like envelopes (outbound request/notification, inbound reply/notification)
//! - The closed set of outbound requests and notifications
//! - The closed set of inbound events pushed by the host
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, and thiserror
//! 2. **No runtime** - Pure data types and serialization
//! 3. **Decode at the boundary** - Raw JSON never travels past the transport

pub mod events;
pub mod messages;
pub mod requests;

pub use events::{InboundEvent, MapInfos, MenuPosition};
pub use messages::{parse_envelope, EnvelopeError, InboundEnvelope, OutboundEnvelope};
pub use requests::{HostNotification, HostRequest, LogLevel};

/// Wire method names.
pub mod method {
    // Outbound requests
    pub const GET_VERSION: &str = "GET_VERSION";
    pub const GET_CURRENT_PROJECT_PATH: &str = "GET_CURRENT_PROJECT_PATH";
    pub const NEEDS_SAVING: &str = "NEEDS_SAVING";
    pub const OPEN_PROJECT: &str = "OPEN_PROJECT";
    pub const SAVE_PROJECT: &str = "SAVE_PROJECT";
    pub const SAVE_PROJECT_AS: &str = "SAVE_PROJECT_AS";
    pub const SAVE_PROJECT_AS_ACTION: &str = "SAVE_PROJECT_AS_ACTION";
    pub const CLOSE_PROJECT: &str = "CLOSE_PROJECT";
    pub const EXPORT_DOCUMENT_MAPS: &str = "EXPORT_DOCUMENT_MAPS";
    pub const IMPORT_PROJECT_RESOURCE: &str = "IMPORT_PROJECT_RESOURCE";
    pub const GET_PROJECT_SETTINGS: &str = "GET_PROJECT_SETTINGS";
    pub const GET_RESOURCE_INFO: &str = "GET_RESOURCE_INFO";
    pub const GET_PROJECT_EXPORT_PATH: &str = "GET_PROJECT_EXPORT_PATH";
    pub const GET_MAP_EXPORT_INFORMATION: &str = "GET_MAP_EXPORT_INFORMATION";
    pub const UPDATE_DOCUMENT_RESOURCES: &str = "UPDATE_DOCUMENT_RESOURCES";
    pub const DOCUMENT_RESOURCES: &str = "DOCUMENT_RESOURCES";
    pub const EXECUTE_STATEMENT: &str = "EXECUTE_STATEMENT";
    pub const EXTRACT_THUMBNAIL: &str = "EXTRACT_THUMBNAIL";

    // Outbound notifications
    pub const LOG_INFO: &str = "LOG_INFO";
    pub const LOG_DEBUG: &str = "LOG_DEBUG";
    pub const LOG_WARNING: &str = "LOG_WARNING";
    pub const LOG_ERROR: &str = "LOG_ERROR";
    pub const LOG_EXCEPTION: &str = "LOG_EXCEPTION";
    pub const TOGGLE_DEBUG_LOGGING: &str = "TOGGLE_DEBUG_LOGGING";
    pub const ENGINE_READY: &str = "ENGINE_READY";

    // Inbound events
    pub const DISPLAY_MENU: &str = "DISPLAY_MENU";
    pub const NEW_PROJECT_CREATED: &str = "NEW_PROJECT_CREATED";
    pub const PROJECT_OPENED: &str = "PROJECT_OPENED";
    pub const QUIT: &str = "QUIT";
    pub const EXPORT_FINISHED: &str = "EXPORT_FINISHED";
}
