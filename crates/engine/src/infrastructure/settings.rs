//! Engine settings loaded from the process environment.
//!
//! The launcher only guarantees the port variable. Everything else has a
//! default matching the host integration's shipped configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::infrastructure::websocket::shared::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_WAIT, DEFAULT_EXPORT_TIMEOUT,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_WAIT,
};
use crate::infrastructure::websocket::TransportConfig;

pub const PORT_ENV: &str = "SGTK_SUBSTANCEPAINTER_ENGINE_PORT";
pub const HOST_ENV: &str = "TKPAINTER_HOST";
pub const CALL_TIMEOUT_ENV: &str = "TKPAINTER_CALL_TIMEOUT_MS";
pub const EXPORT_TIMEOUT_ENV: &str = "TKPAINTER_EXPORT_TIMEOUT_MS";
pub const MAX_RECONNECT_ATTEMPTS_ENV: &str = "TKPAINTER_MAX_RECONNECT_ATTEMPTS";
pub const RECONNECT_WAIT_ENV: &str = "TKPAINTER_RECONNECT_WAIT_MS";
pub const AUTOMATIC_CONTEXT_SWITCH_ENV: &str = "TKPAINTER_AUTOMATIC_CONTEXT_SWITCH";
pub const USE_SGTK_MENU_NAME_ENV: &str = "TKPAINTER_USE_SGTK_MENU_NAME";
pub const COMPATIBILITY_DIALOG_MIN_VERSION_ENV: &str = "TKPAINTER_COMPATIBILITY_DIALOG_MIN_VERSION";
pub const TESTED_VERSION_ENV: &str = "TKPAINTER_TESTED_VERSION";
pub const DEBUG_ENV: &str = "TK_DEBUG";
pub const COMPATIBILITY_DIALOG_SHOWN_ENV: &str = "SGTK_COMPATIBILITY_DIALOG_SHOWN";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_COMPATIBILITY_DIALOG_MIN_VERSION: u32 = 2018;
const DEFAULT_TESTED_VERSION: &str = "2018.3";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("Invalid host URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub port: u16,
    pub host: String,
    pub call_timeout: Duration,
    pub export_timeout: Duration,
    pub connect_wait: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_wait: Duration,
    /// Re-resolve the pipeline context when the host opens a project.
    pub automatic_context_switch: bool,
    /// Name the menu `Sgtk` instead of `Shotgun`.
    pub use_sgtk_menu_name: bool,
    /// Host majors below this never show the compatibility warning dialog.
    pub compatibility_dialog_min_version: u32,
    /// Newest host release fully tested with the engine.
    pub tested_version: String,
    pub debug_logging: bool,
    /// The compatibility warning was already shown in this host session.
    pub compatibility_dialog_shown: bool,
}

impl EngineSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port_value = read(PORT_ENV).ok_or(SettingsError::Missing(PORT_ENV))?;
        let port = parse_number::<u16>(PORT_ENV, &port_value)?;

        let settings = Self {
            port,
            host: read(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            call_timeout: read_millis(read(CALL_TIMEOUT_ENV), CALL_TIMEOUT_ENV, DEFAULT_CALL_TIMEOUT)?,
            export_timeout: read_millis(
                read(EXPORT_TIMEOUT_ENV),
                EXPORT_TIMEOUT_ENV,
                DEFAULT_EXPORT_TIMEOUT,
            )?,
            connect_wait: DEFAULT_CONNECT_WAIT,
            max_reconnect_attempts: match read(MAX_RECONNECT_ATTEMPTS_ENV) {
                Some(value) => parse_number(MAX_RECONNECT_ATTEMPTS_ENV, &value)?,
                None => DEFAULT_MAX_RECONNECT_ATTEMPTS,
            },
            reconnect_wait: read_millis(
                read(RECONNECT_WAIT_ENV),
                RECONNECT_WAIT_ENV,
                DEFAULT_RECONNECT_WAIT,
            )?,
            automatic_context_switch: match read(AUTOMATIC_CONTEXT_SWITCH_ENV) {
                Some(value) => parse_flag(AUTOMATIC_CONTEXT_SWITCH_ENV, &value)?,
                None => true,
            },
            use_sgtk_menu_name: match read(USE_SGTK_MENU_NAME_ENV) {
                Some(value) => parse_flag(USE_SGTK_MENU_NAME_ENV, &value)?,
                None => false,
            },
            compatibility_dialog_min_version: match read(COMPATIBILITY_DIALOG_MIN_VERSION_ENV) {
                Some(value) => parse_number(COMPATIBILITY_DIALOG_MIN_VERSION_ENV, &value)?,
                None => DEFAULT_COMPATIBILITY_DIALOG_MIN_VERSION,
            },
            tested_version: read(TESTED_VERSION_ENV)
                .unwrap_or_else(|| DEFAULT_TESTED_VERSION.to_string()),
            debug_logging: read(DEBUG_ENV).as_deref() == Some("1"),
            compatibility_dialog_shown: read(COMPATIBILITY_DIALOG_SHOWN_ENV).is_some(),
        };

        settings.host_url()?;
        Ok(settings)
    }

    /// `ws://<host>:<port>` for the host-side script.
    pub fn host_url(&self) -> Result<Url, SettingsError> {
        let url = Url::parse(&format!("ws://{}:{}", self.host, self.port))?;
        if url.host_str().is_none() {
            return Err(SettingsError::Invalid {
                name: HOST_ENV,
                value: self.host.clone(),
            });
        }
        Ok(url)
    }

    pub fn menu_name(&self) -> &'static str {
        if self.use_sgtk_menu_name {
            "Sgtk"
        } else {
            "Shotgun"
        }
    }

    pub fn transport_config(&self) -> Result<TransportConfig, SettingsError> {
        Ok(TransportConfig {
            url: self.host_url()?.to_string(),
            call_timeout: self.call_timeout,
            connect_wait: self.connect_wait,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_wait: self.reconnect_wait,
        })
    }
}

/// Load `.env.local` then `.env` from `dir` without overriding set variables.
///
/// Returns the files that were loaded.
pub fn load_dotenv_files(dir: &Path) -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        if !path.exists() {
            continue;
        }
        match dotenvy::from_path(&path) {
            Ok(()) => loaded.push(path),
            Err(e) => tracing::warn!("Failed to load {}: {}", path.display(), e),
        }
    }
    loaded
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn read_millis(
    value: Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, SettingsError> {
    match value {
        Some(value) => Ok(Duration::from_millis(parse_number(name, &value)?)),
        None => Ok(default),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}
