//! Built-in handling for host-pushed events.

use std::path::Path;
use std::rc::Rc;

use tkpainter_shared::InboundEvent;

use crate::infrastructure::ports::{ContextResolver, MenuHost, MessageLevel, UserNotifier};
use crate::use_cases::callbacks::CallbackRegistry;

/// Name the host gives a fresh, never-saved project.
const UNTITLED_PROJECT: &str = "Untitled.spp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    Continue,
    Quit,
}

pub struct InboundDispatcher {
    menu: Rc<dyn MenuHost>,
    contexts: Rc<dyn ContextResolver>,
    notifier: Rc<dyn UserNotifier>,
    callbacks: Rc<CallbackRegistry>,
    automatic_context_switch: bool,
}

impl InboundDispatcher {
    pub fn new(
        menu: Rc<dyn MenuHost>,
        contexts: Rc<dyn ContextResolver>,
        notifier: Rc<dyn UserNotifier>,
        callbacks: Rc<CallbackRegistry>,
        automatic_context_switch: bool,
    ) -> Self {
        Self {
            menu,
            contexts,
            notifier,
            callbacks,
            automatic_context_switch,
        }
    }

    /// Run the built-in action, then every callback registered for the event.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchAction {
        tracing::debug!(method = event.name(), "Dispatching host event");

        let action = match event {
            InboundEvent::DisplayMenu { clicked_position } => {
                self.menu.show_menu(*clicked_position);
                DispatchAction::Continue
            }
            InboundEvent::NewProjectCreated { path } | InboundEvent::ProjectOpened { path } => {
                self.refresh_context(path);
                DispatchAction::Continue
            }
            InboundEvent::Quit => DispatchAction::Quit,
            InboundEvent::ExportFinished { .. }
            | InboundEvent::Other { .. }
            | InboundEvent::Rejected { .. } => DispatchAction::Continue,
        };

        let invoked = self.callbacks.invoke(event);
        if invoked == 0 && matches!(event, InboundEvent::Other { .. }) {
            tracing::debug!(method = event.name(), "Ignoring unhandled host event");
        }
        action
    }

    fn refresh_context(&self, path: &str) {
        if !self.automatic_context_switch {
            tracing::debug!(path, "Automatic context switch disabled");
            return;
        }

        // File->New: keep the current context.
        if Path::new(path).file_name().and_then(|name| name.to_str()) == Some(UNTITLED_PROJECT) {
            self.menu.rebuild_menu(false);
            return;
        }

        let context = match self.contexts.context_from_path(path) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(path, "Could not resolve context from path: {}", e);
                match self.contexts.project_context() {
                    Ok(context) => {
                        self.notifier.show_message(
                            MessageLevel::Warning,
                            &format!(
                                "The pipeline engine could not detect the context from the \
                                 project loaded. Menus will be reset to the project '{}' context.",
                                context.project
                            ),
                        );
                        context
                    }
                    Err(e) => {
                        tracing::error!("No project context to fall back to: {}", e);
                        self.menu.rebuild_menu(true);
                        self.notifier.show_message(
                            MessageLevel::Error,
                            &format!("The pipeline engine cannot be started: {e}"),
                        );
                        return;
                    }
                }
            }
        };

        if self.contexts.current_context().as_ref() != Some(&context) {
            self.contexts.change_context(context);
        }
        self.menu.rebuild_menu(false);
    }
}
