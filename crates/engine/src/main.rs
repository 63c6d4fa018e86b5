//! tkpainter Engine - Main entry point.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;

use tkpainter_engine::infrastructure::headless::{HeadlessMenu, LogNotifier, ProjectPathResolver};
use tkpainter_engine::infrastructure::logging::init_logging;
use tkpainter_engine::infrastructure::settings::{load_dotenv_files, EngineSettings};
use tkpainter_engine::{EnginePorts, PainterEngine};

/// Pipeline project the headless resolver falls back to.
const PROJECT_ENV: &str = "TKPAINTER_PROJECT";

fn main() -> anyhow::Result<()> {
    // Load environment from repo root (local runs start from `crates/engine`).
    let loaded = load_dotenv_from_repo_root();

    let settings = EngineSettings::from_env().context("Failed to read engine settings")?;
    let logs = Rc::new(init_logging(settings.debug_logging));
    for path in &loaded {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    tracing::info!("Starting tkpainter engine");

    let project = std::env::var(PROJECT_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if project.is_none() {
        tracing::warn!("{} is not set, context fallback is unavailable", PROJECT_ENV);
    }

    let ports = EnginePorts {
        menu: Rc::new(HeadlessMenu::new(settings.menu_name())),
        contexts: Rc::new(ProjectPathResolver::new(project)),
        notifier: Rc::new(LogNotifier),
        logs,
    };

    let engine = PainterEngine::new(settings, ports)?;
    engine.start().context("Engine failed to start")?;

    let info = engine.host_info();
    tracing::info!(host = info.name, version = %info.version, "Engine running");

    engine.run();
    Ok(())
}

fn load_dotenv_from_repo_root() -> Vec<PathBuf> {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");
    load_dotenv_files(&repo_root)
}
