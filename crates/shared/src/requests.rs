//! Outbound requests and notifications.
//!
//! Every operation the engine can ask of the host is one variant here, so a
//! method name and its params can't drift apart at the call site.

use serde_json::{json, Value};

use crate::method;

/// Call-and-wait operations. The host answers each with a `result`.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    GetVersion,
    GetCurrentProjectPath,
    NeedsSaving,
    OpenProject {
        path: String,
    },
    SaveProject,
    SaveProjectAs {
        path: String,
    },
    /// Lets the host show its own "save as" dialog.
    SaveProjectAsAction,
    CloseProject,
    ExportDocumentMaps {
        destination: String,
    },
    ImportProjectResource {
        path: String,
        usage: String,
        destination: String,
    },
    GetProjectSettings {
        key: String,
    },
    GetResourceInfo {
        url: String,
    },
    GetProjectExportPath,
    GetMapExportInformation,
    UpdateDocumentResources {
        old_url: String,
        new_url: String,
    },
    DocumentResources,
    ExecuteStatement {
        statement: String,
    },
    ExtractThumbnail {
        path: String,
    },
}

impl HostRequest {
    pub fn method(&self) -> &'static str {
        match self {
            HostRequest::GetVersion => method::GET_VERSION,
            HostRequest::GetCurrentProjectPath => method::GET_CURRENT_PROJECT_PATH,
            HostRequest::NeedsSaving => method::NEEDS_SAVING,
            HostRequest::OpenProject { .. } => method::OPEN_PROJECT,
            HostRequest::SaveProject => method::SAVE_PROJECT,
            HostRequest::SaveProjectAs { .. } => method::SAVE_PROJECT_AS,
            HostRequest::SaveProjectAsAction => method::SAVE_PROJECT_AS_ACTION,
            HostRequest::CloseProject => method::CLOSE_PROJECT,
            HostRequest::ExportDocumentMaps { .. } => method::EXPORT_DOCUMENT_MAPS,
            HostRequest::ImportProjectResource { .. } => method::IMPORT_PROJECT_RESOURCE,
            HostRequest::GetProjectSettings { .. } => method::GET_PROJECT_SETTINGS,
            HostRequest::GetResourceInfo { .. } => method::GET_RESOURCE_INFO,
            HostRequest::GetProjectExportPath => method::GET_PROJECT_EXPORT_PATH,
            HostRequest::GetMapExportInformation => method::GET_MAP_EXPORT_INFORMATION,
            HostRequest::UpdateDocumentResources { .. } => method::UPDATE_DOCUMENT_RESOURCES,
            HostRequest::DocumentResources => method::DOCUMENT_RESOURCES,
            HostRequest::ExecuteStatement { .. } => method::EXECUTE_STATEMENT,
            HostRequest::ExtractThumbnail { .. } => method::EXTRACT_THUMBNAIL,
        }
    }

    /// Named params as the host script expects them.
    pub fn params(&self) -> Value {
        match self {
            HostRequest::OpenProject { path }
            | HostRequest::SaveProjectAs { path }
            | HostRequest::ExtractThumbnail { path } => json!({ "path": path }),
            HostRequest::ExportDocumentMaps { destination } => {
                json!({ "destination": destination })
            }
            HostRequest::ImportProjectResource {
                path,
                usage,
                destination,
            } => json!({
                "path": path,
                "usage": usage,
                "destination": destination,
            }),
            HostRequest::GetProjectSettings { key } => json!({ "key": key }),
            HostRequest::GetResourceInfo { url } => json!({ "url": url }),
            HostRequest::UpdateDocumentResources { old_url, new_url } => json!({
                "old_url": old_url,
                "new_url": new_url,
            }),
            HostRequest::ExecuteStatement { statement } => json!({ "statement": statement }),
            HostRequest::GetVersion
            | HostRequest::GetCurrentProjectPath
            | HostRequest::NeedsSaving
            | HostRequest::SaveProject
            | HostRequest::SaveProjectAsAction
            | HostRequest::CloseProject
            | HostRequest::GetProjectExportPath
            | HostRequest::GetMapExportInformation
            | HostRequest::DocumentResources => json!({}),
        }
    }
}

/// Severity of a message forwarded to the host's log window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Exception,
}

impl LogLevel {
    pub fn method(self) -> &'static str {
        match self {
            LogLevel::Debug => method::LOG_DEBUG,
            LogLevel::Info => method::LOG_INFO,
            LogLevel::Warning => method::LOG_WARNING,
            LogLevel::Error => method::LOG_ERROR,
            LogLevel::Exception => method::LOG_EXCEPTION,
        }
    }
}

/// Fire-and-forget messages. The host never replies.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    Log { level: LogLevel, message: String },
    ToggleDebugLogging { enabled: bool },
    /// Named broadcast with no params, e.g. `ENGINE_READY`.
    Broadcast { event: String },
}

impl HostNotification {
    pub fn engine_ready() -> Self {
        HostNotification::Broadcast {
            event: method::ENGINE_READY.to_string(),
        }
    }

    pub fn method(&self) -> &str {
        match self {
            HostNotification::Log { level, .. } => level.method(),
            HostNotification::ToggleDebugLogging { .. } => method::TOGGLE_DEBUG_LOGGING,
            HostNotification::Broadcast { event } => event,
        }
    }

    pub fn params(&self) -> Value {
        match self {
            HostNotification::Log { message, .. } => json!({ "message": message }),
            HostNotification::ToggleDebugLogging { enabled } => json!({ "enabled": enabled }),
            HostNotification::Broadcast { .. } => json!({}),
        }
    }
}
