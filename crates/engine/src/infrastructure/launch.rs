//! Launcher side of the environment contract.
//!
//! The launcher picks a free local port and hands it to the host process,
//! both as environment variables and as an argument string the host-side
//! script can decode (`"&KEY=value&KEY2=value"`), since the host's script
//! runtime can't read the environment directly.

use std::collections::BTreeMap;
use std::net::TcpListener;

use super::settings::{COMPATIBILITY_DIALOG_SHOWN_ENV, PORT_ENV};

pub const STARTUP_ENV: &str = "SGTK_SUBSTANCEPAINTER_ENGINE_STARTUP";
pub const FILE_TO_OPEN_ENV: &str = "SGTK_FILE_TO_OPEN";

/// Ask the OS for an unused TCP port on the loopback interface.
pub fn find_free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnvironment {
    pub port: u16,
    pub startup_script: Option<String>,
    pub file_to_open: Option<String>,
    /// Set once the compatibility warning was shown in this host session.
    pub compatibility_dialog_shown: bool,
}

impl LaunchEnvironment {
    pub fn discover() -> std::io::Result<Self> {
        let port = find_free_port()?;
        tracing::debug!(port, "Allocated engine port");
        Ok(Self {
            port,
            startup_script: None,
            file_to_open: None,
            compatibility_dialog_shown: false,
        })
    }

    pub fn with_startup_script(mut self, path: impl Into<String>) -> Self {
        self.startup_script = Some(path.into().replace('\\', "/"));
        self
    }

    pub fn with_file_to_open(mut self, path: impl Into<String>) -> Self {
        self.file_to_open = Some(path.into());
        self
    }

    pub fn with_compatibility_dialog_shown(mut self, shown: bool) -> Self {
        self.compatibility_dialog_shown = shown;
        self
    }

    pub fn env_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert(PORT_ENV.to_string(), self.port.to_string());
        if let Some(script) = &self.startup_script {
            vars.insert(STARTUP_ENV.to_string(), script.clone());
        }
        if let Some(file) = &self.file_to_open {
            vars.insert(FILE_TO_OPEN_ENV.to_string(), file.clone());
        }
        if self.compatibility_dialog_shown {
            vars.insert(COMPATIBILITY_DIALOG_SHOWN_ENV.to_string(), "1".to_string());
        }
        vars
    }

    /// Quoted `&KEY=value` argument carrying the launch variables.
    pub fn encoded_args(&self) -> String {
        let pairs: Vec<String> = self
            .env_vars()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!("\"&{}\"", pairs.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_port_is_bindable() {
        let port = find_free_port().unwrap();
        assert_ne!(port, 0);
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }

    #[test]
    fn env_vars_carry_port_and_optional_entries() {
        let env = LaunchEnvironment {
            port: 4567,
            startup_script: None,
            file_to_open: None,
            compatibility_dialog_shown: false,
        };
        assert_eq!(env.env_vars().get(PORT_ENV).map(String::as_str), Some("4567"));
        assert_eq!(env.env_vars().len(), 1);

        let env = env
            .with_startup_script(r"C:\engine\startup\bootstrap.js")
            .with_file_to_open("/projects/hero.spp");
        let vars = env.env_vars();
        assert_eq!(vars[STARTUP_ENV], "C:/engine/startup/bootstrap.js");
        assert_eq!(vars[FILE_TO_OPEN_ENV], "/projects/hero.spp");
    }

    #[test]
    fn encoded_args_join_pairs() {
        let env = LaunchEnvironment {
            port: 4567,
            startup_script: None,
            file_to_open: Some("/p.spp".to_string()),
            compatibility_dialog_shown: false,
        };
        assert_eq!(
            env.encoded_args(),
            "\"&SGTK_FILE_TO_OPEN=/p.spp&SGTK_SUBSTANCEPAINTER_ENGINE_PORT=4567\""
        );
    }

    #[test]
    fn discovered_port_matches_settings_contract() {
        let env = LaunchEnvironment::discover().unwrap();
        let vars = env.env_vars();
        let settings = crate::infrastructure::settings::EngineSettings::from_lookup(|name| {
            vars.get(name).cloned()
        })
        .unwrap();
        assert_eq!(settings.port, env.port);
    }

    #[test]
    fn shown_dialog_flag_reaches_child_settings() {
        let env = LaunchEnvironment::discover()
            .unwrap()
            .with_compatibility_dialog_shown(true);
        let vars = env.env_vars();
        assert_eq!(vars[COMPATIBILITY_DIALOG_SHOWN_ENV], "1");

        let settings = crate::infrastructure::settings::EngineSettings::from_lookup(|name| {
            vars.get(name).cloned()
        })
        .unwrap();
        assert!(settings.compatibility_dialog_shown);
    }
}
