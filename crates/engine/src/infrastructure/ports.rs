//! Port traits for the collaborators outside the engine bridge.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - The pipeline menu (host UI)
//! - Pipeline context resolution (studio platform)
//! - User-facing messages (dialogs)
//! - The reloadable log filter (for testing)

use tkpainter_shared::MenuPosition;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("No pipeline context for {0}")]
    NotFound(String),
    #[error("Context resolution failed: {0}")]
    Resolution(String),
}

// =============================================================================
// Infrastructure Types
// =============================================================================

/// Opaque pipeline context token (project plus optional entity/task).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineContext {
    pub project: String,
    pub entity: Option<String>,
}

impl PipelineContext {
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            project: name.into(),
            entity: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

// =============================================================================
// Ports
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait MenuHost {
    /// Pop the pipeline menu up at `position`, or at the pointer when None.
    fn show_menu(&self, position: Option<MenuPosition>);
    /// Rebuild the menu for the current context.
    fn rebuild_menu(&self, disabled: bool);
}

#[cfg_attr(test, mockall::automock)]
pub trait ContextResolver {
    fn current_context(&self) -> Option<PipelineContext>;
    fn context_from_path(&self, path: &str) -> Result<PipelineContext, ContextError>;
    /// Context for the current project alone, used when a path can't be resolved.
    fn project_context(&self) -> Result<PipelineContext, ContextError>;
    fn change_context(&self, context: PipelineContext);
}

#[cfg_attr(test, mockall::automock)]
pub trait UserNotifier {
    fn show_message(&self, level: MessageLevel, message: &str);
}

#[cfg_attr(test, mockall::automock)]
pub trait LogControl {
    fn set_debug(&self, enabled: bool);
    fn debug_enabled(&self) -> bool;
}
