//! Engine composition.
//!
//! `PainterEngine` is built once at startup and owns every component. There
//! is no global engine: callers hold the `Rc` returned by `new`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tkpainter_shared::{method, InboundEvent, LogLevel};

use crate::infrastructure::ports::{
    ContextResolver, LogControl, MenuHost, MessageLevel, UserNotifier,
};
use crate::infrastructure::settings::{EngineSettings, SettingsError, TESTED_VERSION_ENV};
use crate::infrastructure::websocket::{ConnectionState, TransportClient};
use crate::use_cases::{
    CallbackRegistry, Compatibility, CompatibilityPolicy, DispatchAction, HostVersion,
    InboundDispatcher, PainterApp, MIN_SUPPORTED_VERSION,
};

pub const HOST_NAME: &str = "SubstancePainter";
const UNKNOWN_VERSION: &str = "unknown";
const RUN_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Could not connect to the host at {0}")]
    ConnectFailed(String),
    #[error("Host version {0} is not supported")]
    UnsupportedHost(String),
}

/// Collaborators outside the bridge.
pub struct EnginePorts {
    pub menu: Rc<dyn MenuHost>,
    pub contexts: Rc<dyn ContextResolver>,
    pub notifier: Rc<dyn UserNotifier>,
    pub logs: Rc<dyn LogControl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub name: &'static str,
    pub version: String,
}

pub struct PainterEngine {
    settings: EngineSettings,
    transport: Rc<TransportClient>,
    callbacks: Rc<CallbackRegistry>,
    app: PainterApp,
    dispatcher: InboundDispatcher,
    compatibility: CompatibilityPolicy,
    menu: Rc<dyn MenuHost>,
    notifier: Rc<dyn UserNotifier>,
    logs: Rc<dyn LogControl>,
    version: RefCell<Option<String>>,
    dialog_shown: Cell<bool>,
    quit_requested: Cell<bool>,
}

impl PainterEngine {
    pub fn new(settings: EngineSettings, ports: EnginePorts) -> Result<Rc<Self>, EngineError> {
        let tested = HostVersion::parse(&settings.tested_version).ok_or_else(|| {
            SettingsError::Invalid {
                name: TESTED_VERSION_ENV,
                value: settings.tested_version.clone(),
            }
        })?;
        let compatibility = CompatibilityPolicy {
            minimum: MIN_SUPPORTED_VERSION,
            tested,
            dialog_min_major: settings.compatibility_dialog_min_version,
        };

        let transport = Rc::new(TransportClient::new(settings.transport_config()?));
        let callbacks = Rc::new(CallbackRegistry::default());
        let app = PainterApp::new(
            Rc::clone(&transport),
            Rc::clone(&callbacks),
            settings.export_timeout,
        );
        let dispatcher = InboundDispatcher::new(
            Rc::clone(&ports.menu),
            ports.contexts,
            Rc::clone(&ports.notifier),
            Rc::clone(&callbacks),
            settings.automatic_context_switch,
        );

        let engine = Rc::new(Self {
            dialog_shown: Cell::new(settings.compatibility_dialog_shown),
            settings,
            transport,
            callbacks,
            app,
            dispatcher,
            compatibility,
            menu: ports.menu,
            notifier: ports.notifier,
            logs: ports.logs,
            version: RefCell::new(None),
            quit_requested: Cell::new(false),
        });

        let weak = Rc::downgrade(&engine);
        engine
            .transport
            .set_on_event(Rc::new(move |event: &InboundEvent| {
                if let Some(engine) = weak.upgrade() {
                    engine.handle_event(event);
                }
            }));

        Ok(engine)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn app(&self) -> &PainterApp {
        &self.app
    }

    pub fn callbacks(&self) -> &Rc<CallbackRegistry> {
        &self.callbacks
    }

    pub fn transport(&self) -> &Rc<TransportClient> {
        &self.transport
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested.get()
    }

    /// True once the compatibility warning counts as shown for this host
    /// session. Launchers pass it on through `LaunchEnvironment`.
    pub fn compatibility_dialog_shown(&self) -> bool {
        self.dialog_shown.get()
    }

    /// Connect, check the host version, build the menu and announce readiness.
    pub fn start(&self) -> Result<(), EngineError> {
        let url = self.transport.config().url.clone();
        tracing::info!(url = %url, "Starting engine");

        self.transport.connect();
        let deadline = Instant::now() + self.settings.connect_wait;
        let connected = self.transport.pump_until(deadline, || {
            self.transport.state() == ConnectionState::Connected
                || self.transport.retries_exhausted()
        });
        if !connected || self.transport.state() != ConnectionState::Connected {
            tracing::error!(url = %url, "Host did not accept the connection");
            self.transport.close();
            return Err(EngineError::ConnectFailed(url));
        }

        let version = match self.app.get_application_version() {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!("Could not query host version: {}", e);
                None
            }
        };
        *self.version.borrow_mut() = version.clone();
        self.check_compatibility(version.as_deref().unwrap_or(UNKNOWN_VERSION))?;

        self.menu.rebuild_menu(false);
        self.app.broadcast_event(method::ENGINE_READY);
        tracing::info!("Engine ready");
        Ok(())
    }

    fn check_compatibility(&self, version: &str) -> Result<(), EngineError> {
        match self.compatibility.check(version, self.dialog_shown.get()) {
            Compatibility::Supported => {
                tracing::debug!(version, "Host version supported");
                Ok(())
            }
            Compatibility::Unknown => {
                tracing::warn!(version, "Unreadable host version, continuing");
                Ok(())
            }
            Compatibility::Unsupported => {
                let message = format!(
                    "{HOST_NAME} {version} is not supported. The minimum version is {}.",
                    self.compatibility.minimum
                );
                tracing::error!("{}", message);
                self.notifier.show_message(MessageLevel::Error, &message);
                Err(EngineError::UnsupportedHost(version.to_string()))
            }
            Compatibility::Untested { show_dialog } => {
                let message = format!(
                    "The pipeline engine has not been tested with {HOST_NAME} {version}. \
                     It is fully tested up to {}. You can continue, but some features may not \
                     work as expected.",
                    self.compatibility.tested
                );
                tracing::warn!("{}", message);
                // Marked shown even when the dialog minimum version suppresses it.
                self.dialog_shown.set(true);
                if show_dialog {
                    self.notifier.show_message(MessageLevel::Warning, &message);
                }
                Ok(())
            }
        }
    }

    /// Host name and version. The version is queried once and cached.
    pub fn host_info(&self) -> HostInfo {
        let cached = self.version.borrow().clone();
        let version = match cached {
            Some(version) => version,
            None => match self.app.get_application_version() {
                Ok(version) => {
                    *self.version.borrow_mut() = Some(version.clone());
                    version
                }
                Err(e) => {
                    tracing::debug!("Host version unavailable: {}", e);
                    UNKNOWN_VERSION.to_string()
                }
            },
        };
        HostInfo {
            name: HOST_NAME,
            version,
        }
    }

    /// Flip the debug filter and tell the host. Returns the new state.
    pub fn toggle_debug_logging(&self) -> bool {
        let enabled = !self.logs.debug_enabled();
        self.logs.set_debug(enabled);
        self.app.toggle_debug_logging(enabled);
        enabled
    }

    /// Log locally and forward the record to the host console.
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error | LogLevel::Exception => tracing::error!("{}", message),
        }
        self.app.log(level, message);
    }

    /// Pump host traffic until quit.
    pub fn run(&self) {
        tracing::debug!("Entering engine loop");
        while !self.quit_requested.get() {
            self.transport
                .pump_until(Instant::now() + RUN_SLICE, || self.quit_requested.get());
        }
        tracing::debug!("Engine loop finished");
    }

    /// Tear down once. Later calls do nothing.
    pub fn quit(&self) {
        if self.quit_requested.replace(true) {
            return;
        }
        if self.transport.retries_exhausted() {
            self.notifier.show_message(
                MessageLevel::Error,
                &format!("The remote application is gone. Closing the {HOST_NAME} engine."),
            );
        }
        self.transport.close();
        tracing::info!("Engine stopped");
    }

    fn handle_event(&self, event: &InboundEvent) {
        if self.dispatcher.dispatch(event) == DispatchAction::Quit {
            self.quit();
        }
    }
}
