//! Typed facade over the host's remote operations.
//!
//! One method per capability. Calls block the owner thread until the host
//! answers; transport failures come back untouched, with no local retries.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tkpainter_shared::{method, HostNotification, HostRequest, InboundEvent, LogLevel, MapInfos};

use crate::infrastructure::websocket::{TransportClient, TransportError};
use crate::use_cases::callbacks::{CallbackHandle, CallbackRegistry};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteAppError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Unexpected result for {method}: {result}")]
    UnexpectedResult { method: &'static str, result: Value },
    #[error("Export did not finish within {0:?}")]
    ExportTimedOut(Duration),
}

pub struct PainterApp {
    transport: Rc<TransportClient>,
    callbacks: Rc<CallbackRegistry>,
    export_timeout: Duration,
}

/// Drops a one-shot callback on every exit path.
struct Unregister<'a> {
    registry: &'a CallbackRegistry,
    event: &'static str,
    handle: CallbackHandle,
}

impl Drop for Unregister<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.event, self.handle);
    }
}

impl PainterApp {
    pub fn new(
        transport: Rc<TransportClient>,
        callbacks: Rc<CallbackRegistry>,
        export_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            callbacks,
            export_timeout,
        }
    }

    fn call(&self, request: HostRequest) -> Result<Value, RemoteAppError> {
        Ok(self.transport.call(&request)?)
    }

    pub fn get_application_version(&self) -> Result<String, RemoteAppError> {
        let result = self.call(HostRequest::GetVersion)?;
        match result.get("painter").and_then(Value::as_str) {
            Some(version) => Ok(version.to_string()),
            None => Err(RemoteAppError::UnexpectedResult {
                method: method::GET_VERSION,
                result,
            }),
        }
    }

    pub fn get_current_project_path(&self) -> Result<Option<String>, RemoteAppError> {
        let result = self.call(HostRequest::GetCurrentProjectPath)?;
        optional_path(method::GET_CURRENT_PROJECT_PATH, result)
    }

    pub fn needs_saving(&self) -> Result<bool, RemoteAppError> {
        let result = self.call(HostRequest::NeedsSaving)?;
        flag(method::NEEDS_SAVING, result)
    }

    pub fn open_project(&self, path: &str) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::OpenProject {
            path: path.to_string(),
        })
    }

    pub fn save_project(&self) -> Result<bool, RemoteAppError> {
        let result = self.call(HostRequest::SaveProject)?;
        flag(method::SAVE_PROJECT, result)
    }

    pub fn save_project_as(&self, path: &str) -> Result<bool, RemoteAppError> {
        let result = self.call(HostRequest::SaveProjectAs {
            path: path.to_string(),
        })?;
        flag(method::SAVE_PROJECT_AS, result)
    }

    /// Let the host run its own "save as" dialog. Returns the chosen path.
    pub fn save_project_as_action(&self) -> Result<Option<String>, RemoteAppError> {
        let result = self.call(HostRequest::SaveProjectAsAction)?;
        optional_path(method::SAVE_PROJECT_AS_ACTION, result)
    }

    pub fn close_project(&self) -> Result<bool, RemoteAppError> {
        let result = self.call(HostRequest::CloseProject)?;
        flag(method::CLOSE_PROJECT, result)
    }

    /// Export every document map to `destination` and wait for the host's
    /// `EXPORT_FINISHED` event.
    ///
    /// The call's own reply is only an acknowledgement; the map infos arrive
    /// with the event.
    pub fn export_document_maps(&self, destination: &str) -> Result<MapInfos, RemoteAppError> {
        let captured: Rc<RefCell<Option<Result<MapInfos, String>>>> = Rc::default();
        let slot = Rc::clone(&captured);
        let handle = self.callbacks.register(
            method::EXPORT_FINISHED,
            Rc::new(move |event: &InboundEvent| {
                let outcome = match event {
                    InboundEvent::ExportFinished { map_infos } => Ok(map_infos.clone()),
                    InboundEvent::Rejected { reason, .. } => Err(reason.clone()),
                    _ => return,
                };
                slot.borrow_mut().get_or_insert(outcome);
            }),
        );
        let _unregister = Unregister {
            registry: &self.callbacks,
            event: method::EXPORT_FINISHED,
            handle,
        };

        let request = HostRequest::ExportDocumentMaps {
            destination: destination.to_string(),
        };
        let (_, session) = self
            .transport
            .call_in_session(&request, self.transport.config().call_timeout)?;
        tracing::info!(destination, "Waiting for export to finish");

        let deadline = Instant::now() + self.export_timeout;
        self.transport.pump_until(deadline, || {
            captured.borrow().is_some() || self.transport.lost_since(session)
        });

        let outcome = captured.borrow_mut().take();
        match outcome {
            Some(Ok(map_infos)) => return Ok(map_infos),
            Some(Err(reason)) => {
                tracing::error!(destination, "Export finished with unreadable map infos");
                return Err(RemoteAppError::UnexpectedResult {
                    method: method::EXPORT_FINISHED,
                    result: Value::String(reason),
                });
            }
            None => {}
        }
        if self.transport.lost_since(session) {
            return Err(TransportError::ConnectionLost.into());
        }
        tracing::error!(destination, "Export did not finish in time");
        Err(RemoteAppError::ExportTimedOut(self.export_timeout))
    }

    pub fn import_project_resource(
        &self,
        path: &str,
        usage: &str,
        destination: &str,
    ) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::ImportProjectResource {
            path: path.to_string(),
            usage: usage.to_string(),
            destination: destination.to_string(),
        })
    }

    pub fn get_project_settings(&self, key: &str) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::GetProjectSettings {
            key: key.to_string(),
        })
    }

    pub fn get_resource_info(&self, url: &str) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::GetResourceInfo {
            url: url.to_string(),
        })
    }

    pub fn get_project_export_path(&self) -> Result<Option<String>, RemoteAppError> {
        let result = self.call(HostRequest::GetProjectExportPath)?;
        optional_path(method::GET_PROJECT_EXPORT_PATH, result)
    }

    pub fn get_map_export_information(&self) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::GetMapExportInformation)
    }

    pub fn update_document_resources(
        &self,
        old_url: &str,
        new_url: &str,
    ) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::UpdateDocumentResources {
            old_url: old_url.to_string(),
            new_url: new_url.to_string(),
        })
    }

    pub fn document_resources(&self) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::DocumentResources)
    }

    /// Evaluate a script statement inside the host.
    pub fn execute(&self, statement: &str) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::ExecuteStatement {
            statement: statement.to_string(),
        })
    }

    pub fn extract_thumbnail(&self, path: &str) -> Result<Value, RemoteAppError> {
        self.call(HostRequest::ExtractThumbnail {
            path: path.to_string(),
        })
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.transport.notify(&HostNotification::Log {
            level,
            message: message.to_string(),
        });
    }

    pub fn toggle_debug_logging(&self, enabled: bool) {
        self.transport
            .notify(&HostNotification::ToggleDebugLogging { enabled });
    }

    pub fn broadcast_event(&self, event: &str) {
        self.transport.notify(&HostNotification::Broadcast {
            event: event.to_string(),
        });
    }
}

fn optional_path(method: &'static str, result: Value) -> Result<Option<String>, RemoteAppError> {
    match result {
        Value::Null => Ok(None),
        Value::String(path) if path.is_empty() => Ok(None),
        Value::String(path) => Ok(Some(path)),
        result => Err(RemoteAppError::UnexpectedResult { method, result }),
    }
}

/// Host scripts answer `null` when an operation had nothing to do.
fn flag(method: &'static str, result: Value) -> Result<bool, RemoteAppError> {
    match result {
        Value::Bool(flag) => Ok(flag),
        Value::Null => Ok(false),
        result => Err(RemoteAppError::UnexpectedResult { method, result }),
    }
}
