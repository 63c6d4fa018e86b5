//! Tracing subscriber setup with a reloadable filter.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use super::ports::LogControl;

pub const DEFAULT_FILTER: &str = "tkpainter_engine=info,tkpainter_shared=info";
pub const DEBUG_FILTER: &str = "tkpainter_engine=debug,tkpainter_shared=debug";

pub fn filter_for(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER })
}

/// Handle to the installed filter.
pub struct ReloadLogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    debug: AtomicBool,
}

impl LogControl for ReloadLogControl {
    fn set_debug(&self, enabled: bool) {
        match self.handle.reload(filter_for(enabled)) {
            Ok(()) => {
                self.debug.store(enabled, Ordering::SeqCst);
                tracing::info!(enabled, "Debug logging toggled");
            }
            Err(e) => tracing::warn!("Failed to reload log filter: {}", e),
        }
    }

    fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the debug flag.
pub fn init_logging(debug: bool) -> ReloadLogControl {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(debug));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    ReloadLogControl {
        handle,
        debug: AtomicBool::new(debug),
    }
}
