//! Events pushed by the host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::EnvelopeError;
use crate::method;

/// Screen position where the host wants the pipeline menu.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MenuPosition {
    pub x: f64,
    pub y: f64,
}

/// Exported maps: texture set name -> map id -> written file path.
pub type MapInfos = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Show the pipeline menu, at the pointer when no position is given.
    DisplayMenu {
        clicked_position: Option<MenuPosition>,
    },
    NewProjectCreated {
        path: String,
    },
    ProjectOpened {
        path: String,
    },
    Quit,
    ExportFinished {
        map_infos: MapInfos,
    },
    /// Anything outside the known vocabulary, kept for named callbacks.
    Other {
        method: String,
        params: Value,
    },
    /// Known method whose params failed to decode.
    Rejected {
        method: String,
        reason: String,
    },
}

#[derive(Deserialize)]
struct DisplayMenuParams {
    #[serde(rename = "clickedPosition", default)]
    clicked_position: Option<MenuPosition>,
}

#[derive(Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Deserialize)]
struct ExportFinishedParams {
    #[serde(default)]
    map_infos: MapInfos,
}

impl InboundEvent {
    /// Decode a notification's params into a typed event.
    pub fn decode(method_name: &str, params: Value) -> Result<Self, EnvelopeError> {
        let invalid = |source| EnvelopeError::InvalidParams {
            method: method_name.to_string(),
            source,
        };

        let event = match method_name {
            method::DISPLAY_MENU => {
                let params: DisplayMenuParams = serde_json::from_value(params).map_err(invalid)?;
                InboundEvent::DisplayMenu {
                    clicked_position: params.clicked_position,
                }
            }
            method::NEW_PROJECT_CREATED => {
                let params: PathParams = serde_json::from_value(params).map_err(invalid)?;
                InboundEvent::NewProjectCreated { path: params.path }
            }
            method::PROJECT_OPENED => {
                let params: PathParams = serde_json::from_value(params).map_err(invalid)?;
                InboundEvent::ProjectOpened { path: params.path }
            }
            method::QUIT => InboundEvent::Quit,
            method::EXPORT_FINISHED => {
                let params: ExportFinishedParams =
                    serde_json::from_value(params).map_err(invalid)?;
                InboundEvent::ExportFinished {
                    map_infos: params.map_infos,
                }
            }
            other => InboundEvent::Other {
                method: other.to_string(),
                params,
            },
        };
        Ok(event)
    }

    /// Wire method name, used as the callback registry key.
    pub fn name(&self) -> &str {
        match self {
            InboundEvent::DisplayMenu { .. } => method::DISPLAY_MENU,
            InboundEvent::NewProjectCreated { .. } => method::NEW_PROJECT_CREATED,
            InboundEvent::ProjectOpened { .. } => method::PROJECT_OPENED,
            InboundEvent::Quit => method::QUIT,
            InboundEvent::ExportFinished { .. } => method::EXPORT_FINISHED,
            InboundEvent::Other { method, .. } | InboundEvent::Rejected { method, .. } => method,
        }
    }

    /// Stand-in for a notification `decode` refused, so callbacks waiting on
    /// the method still hear about it.
    pub fn rejected(error: &EnvelopeError) -> Option<Self> {
        match error {
            EnvelopeError::InvalidParams { method, source } => Some(InboundEvent::Rejected {
                method: method.clone(),
                reason: source.to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_menu_with_position() {
        let event = InboundEvent::decode(
            "DISPLAY_MENU",
            json!({"clickedPosition": {"x": 10, "y": 20}}),
        )
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::DisplayMenu {
                clicked_position: Some(MenuPosition { x: 10.0, y: 20.0 }),
            }
        );
    }

    #[test]
    fn display_menu_without_position() {
        let event = InboundEvent::decode("DISPLAY_MENU", json!({})).unwrap();
        assert_eq!(
            event,
            InboundEvent::DisplayMenu {
                clicked_position: None
            }
        );
    }

    #[test]
    fn export_finished_carries_map_infos() {
        let event = InboundEvent::decode(
            "EXPORT_FINISHED",
            json!({"map_infos": {"body": {"baseColor": "/out/body_baseColor.png"}}}),
        )
        .unwrap();

        let InboundEvent::ExportFinished { map_infos } = event else {
            panic!("expected ExportFinished");
        };
        assert_eq!(map_infos["body"]["baseColor"], "/out/body_baseColor.png");
    }

    #[test]
    fn project_opened_requires_path() {
        let err = InboundEvent::decode("PROJECT_OPENED", json!({})).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidParams { .. }));
    }

    #[test]
    fn export_with_non_path_entry_is_rejected_by_name() {
        let err = InboundEvent::decode(
            "EXPORT_FINISHED",
            json!({"map_infos": {"body": {"baseColor": ["/out/a.png"]}}}),
        )
        .unwrap_err();

        let event = InboundEvent::rejected(&err).unwrap();
        assert_eq!(event.name(), "EXPORT_FINISHED");
        assert!(matches!(event, InboundEvent::Rejected { .. }));
    }

    #[test]
    fn only_param_errors_become_rejected_events() {
        assert!(InboundEvent::rejected(&EnvelopeError::Unrecognized).is_none());
    }

    #[test]
    fn unknown_method_is_kept_by_name() {
        let event = InboundEvent::decode("SOMETHING_NEW", json!({"a": 1})).unwrap();
        assert_eq!(event.name(), "SOMETHING_NEW");
        assert!(matches!(event, InboundEvent::Other { .. }));
    }

    #[test]
    fn quit_ignores_params() {
        let event = InboundEvent::decode("QUIT", json!({"whatever": true})).unwrap();
        assert_eq!(event, InboundEvent::Quit);
        assert_eq!(event.name(), "QUIT");
    }
}
