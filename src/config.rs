//! Configuration for the aider API server
//!
//! Values are resolved once at startup, CLI/env first, then the optional
//! `~/.aider-api/config.toml`, then built-in defaults. The result is immutable.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AiderApiError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,

    /// Path to the aider executable
    pub aider_bin: Option<PathBuf>,

    /// Kill aider when a streaming client goes away
    pub kill_on_disconnect: Option<bool>,

    /// Delivery mode for requests that don't set `stream`
    pub default_stream: Option<bool>,

    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicitly given path must exist. The default path is optional, and a
    /// broken default file only produces a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path).map_err(|e| {
                AiderApiError::Config(format!("failed to read {}: {}", path.display(), e))
            })?;
            return Self::parse(&content)
                .map_err(|e| AiderApiError::Config(format!("{}: {}", path.display(), e)));
        }

        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Ok(Self::default())
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Get the default config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".aider-api")
        .join("config.toml")
}

/// Values given on the command line (or through clap's env fallbacks)
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub aider_bin: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Process-wide settings, fixed after startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub aider_bin: PathBuf,
    pub kill_on_disconnect: bool,
    pub default_stream: bool,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            aider_bin: PathBuf::from("aider"),
            kill_on_disconnect: true,
            default_stream: true,
            log_file: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    /// Merge CLI overrides over the file config over defaults
    pub fn resolve(cli: Overrides, file: FileConfig) -> Self {
        let virtual_env = std::env::var_os("VIRTUAL_ENV").map(PathBuf::from);
        Self::resolve_with_venv(cli, file, virtual_env.as_deref())
    }

    fn resolve_with_venv(cli: Overrides, file: FileConfig, virtual_env: Option<&Path>) -> Self {
        let defaults = Self::default();
        Self {
            host: cli.host.or(file.host).unwrap_or(defaults.host),
            port: cli.port.or(file.port).unwrap_or(defaults.port),
            aider_bin: resolve_aider_bin(cli.aider_bin.or(file.aider_bin), virtual_env),
            kill_on_disconnect: file.kill_on_disconnect.unwrap_or(defaults.kill_on_disconnect),
            default_stream: file.default_stream.unwrap_or(defaults.default_stream),
            log_file: cli.log_file.or(file.log_file),
            log_level: cli.log_level.or(file.log_level).unwrap_or(defaults.log_level),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locate aider: explicit path, else the active virtualenv's `bin/aider`, else `$PATH`
pub fn resolve_aider_bin(explicit: Option<PathBuf>, virtual_env: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    if let Some(venv) = virtual_env {
        let candidate = venv.join("bin").join("aider");
        if candidate.is_file() {
            return candidate;
        }
    }

    PathBuf::from("aider")
}
