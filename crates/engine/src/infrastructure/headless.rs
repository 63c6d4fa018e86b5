//! Log-only adapters for running the engine without a pipeline UI.

use std::cell::RefCell;
use std::path::Path;

use tkpainter_shared::MenuPosition;

use super::ports::{
    ContextError, ContextResolver, MenuHost, MessageLevel, PipelineContext, UserNotifier,
};

pub struct HeadlessMenu {
    name: &'static str,
}

impl HeadlessMenu {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl MenuHost for HeadlessMenu {
    fn show_menu(&self, position: Option<MenuPosition>) {
        match position {
            Some(MenuPosition { x, y }) => tracing::info!(menu = self.name, x, y, "Show menu"),
            None => tracing::info!(menu = self.name, "Show menu at pointer"),
        }
    }

    fn rebuild_menu(&self, disabled: bool) {
        tracing::info!(menu = self.name, disabled, "Rebuild menu");
    }
}

/// Resolves host project files under a fixed project name.
pub struct ProjectPathResolver {
    project: Option<String>,
    current: RefCell<Option<PipelineContext>>,
}

impl ProjectPathResolver {
    pub fn new(project: Option<String>) -> Self {
        let current = project.clone().map(PipelineContext::project);
        Self {
            project,
            current: RefCell::new(current),
        }
    }
}

impl ContextResolver for ProjectPathResolver {
    fn current_context(&self) -> Option<PipelineContext> {
        self.current.borrow().clone()
    }

    fn context_from_path(&self, path: &str) -> Result<PipelineContext, ContextError> {
        let project = self
            .project
            .clone()
            .ok_or_else(|| ContextError::NotFound(path.to_string()))?;
        let path = Path::new(path);
        if path.extension().and_then(|ext| ext.to_str()) != Some("spp") {
            return Err(ContextError::NotFound(path.display().to_string()));
        }
        let entity = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string);
        Ok(PipelineContext { project, entity })
    }

    fn project_context(&self) -> Result<PipelineContext, ContextError> {
        self.project
            .clone()
            .map(PipelineContext::project)
            .ok_or_else(|| ContextError::Resolution("no project configured".to_string()))
    }

    fn change_context(&self, context: PipelineContext) {
        tracing::info!(project = %context.project, entity = ?context.entity, "Context changed");
        *self.current.borrow_mut() = Some(context);
    }
}

pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn show_message(&self, level: MessageLevel, message: &str) {
        match level {
            MessageLevel::Info => tracing::info!("{}", message),
            MessageLevel::Warning => tracing::warn!("{}", message),
            MessageLevel::Error => tracing::error!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_files_resolve_to_entity_context() {
        let resolver = ProjectPathResolver::new(Some("demo".to_string()));
        let context = resolver.context_from_path("/work/hero_body.spp").unwrap();
        assert_eq!(context.project, "demo");
        assert_eq!(context.entity.as_deref(), Some("hero_body"));
    }

    #[test]
    fn non_project_files_are_not_found() {
        let resolver = ProjectPathResolver::new(Some("demo".to_string()));
        assert!(matches!(
            resolver.context_from_path("/work/notes.txt"),
            Err(ContextError::NotFound(_))
        ));
    }

    #[test]
    fn no_project_means_no_fallback() {
        let resolver = ProjectPathResolver::new(None);
        assert!(resolver.current_context().is_none());
        assert!(resolver.project_context().is_err());
    }

    #[test]
    fn change_context_updates_current() {
        let resolver = ProjectPathResolver::new(Some("demo".to_string()));
        let context = PipelineContext {
            project: "demo".to_string(),
            entity: Some("prop".to_string()),
        };
        resolver.change_context(context.clone());
        assert_eq!(resolver.current_context(), Some(context));
    }
}
