//! Runtime configuration: `orbitx.toml`, overridden by CLI flags.

use std::path::{Path, PathBuf};

use orbitx_shell::ShellIntegrationConfig;
use orbitx_terminal::TerminalCommands;
use serde::Deserialize;

const CONFIG_FILE: &str = "orbitx/orbitx.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentCommands {
    pub agent_execute: String,
    pub agent_cancel: String,
}

impl Default for AgentCommands {
    fn default() -> Self {
        Self {
            agent_execute: "agent_execute_task".to_string(),
            agent_cancel: "agent_cancel_task".to_string(),
        }
    }
}

/// `[commands]`: backend command names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    #[serde(flatten)]
    pub terminal: TerminalCommands,
    #[serde(flatten)]
    pub agent: AgentCommands,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub socket_path: Option<String>,
    pub shell: ShellIntegrationConfig,
    pub commands: CommandsConfig,
}

impl RuntimeConfig {
    /// Load `explicit`, or the default location if it exists.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Socket path precedence: CLI flag, config file, built-in default.
    pub fn resolve_socket_path(&self, flag: Option<String>, fallback: impl FnOnce() -> String) -> String {
        flag.or_else(|| self.socket_path.clone())
            .unwrap_or_else(fallback)
    }
}

/// `$XDG_CONFIG_HOME/orbitx/orbitx.toml`, else `~/.config/orbitx/orbitx.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join(CONFIG_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config").join(CONFIG_FILE))
}
