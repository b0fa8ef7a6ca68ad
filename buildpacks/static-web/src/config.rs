use crate::launch::{parse_port, PORT_ENV_VAR};
use libcnb::Env;
use serde::Deserialize;

/// Port nginx listens on when `PORT` is not set.
pub(crate) const DEFAULT_PORT: u16 = 8080;

/// The `[metadata]` table of `buildpack.toml`.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct StaticWebBuildpackMetadata {
    #[serde(default)]
    pub(crate) capabilities: Capabilities,
}

/// Build plan names shared with the companion buildpacks. They must match what those buildpacks
/// provide.
#[derive(Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Capabilities {
    pub(crate) web_server: String,
    pub(crate) static_files: String,
    pub(crate) build_tool: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            web_server: String::from("nginx"),
            static_files: String::from("static"),
            build_tool: String::from("node_build"),
        }
    }
}

/// Settings for the web server that are sourced from the environment.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ServerSettings {
    pub(crate) port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum SettingsError {
    #[error("Invalid value for PORT: {0:?} is not a port number between 1 and 65535")]
    InvalidPort(String),
}

impl ServerSettings {
    pub(crate) fn from_env(env: &Env) -> Result<Self, SettingsError> {
        let port = match env.get_string_lossy(PORT_ENV_VAR) {
            None => DEFAULT_PORT,
            Some(value) => parse_port(&value).ok_or(SettingsError::InvalidPort(value))?,
        };

        Ok(Self { port })
    }
}
