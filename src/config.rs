//! Configuration loading and management
//!
//! Handles parsing of `glaura.toml` configuration files. Lookup order:
//! 1) explicit `--config` / `GLAURA_CONFIG` path
//! 2) `glaura.toml` in the working directory
//! 3) `glaura.toml` in the user config directory
//! 4) built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const CONFIG_FILENAME: &str = "glaura.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// REST API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,

    /// Roll-up policy
    #[serde(default)]
    pub rollup: RollupConfig,

    /// Upstream status conventions per entity
    #[serde(default)]
    pub conventions: ConventionsConfig,
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the store endpoints are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name recorded as `created_by` when no user is given
    #[serde(default = "default_user")]
    pub user: String,
}

fn default_user() -> String {
    "unknown".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
        }
    }
}

/// Roll-up policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Reset a complete parent when it gains an incomplete child
    #[serde(default = "default_true")]
    pub auto_reopen: bool,

    /// Retry a roll-up write once after a transient failure
    #[serde(default = "default_true")]
    pub retry_transient_writes: bool,

    /// Serialize roll-ups per header and per service
    #[serde(default = "default_true")]
    pub serialize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            auto_reopen: true,
            retry_transient_writes: true,
            serialize: true,
        }
    }
}

/// How an upstream entity encodes its status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusConvention {
    /// `true` means complete.
    #[default]
    CompleteIsTrue,
    /// `true` means pending.
    PendingIsTrue,
}

impl StatusConvention {
    /// Translate between the upstream flag and `true = complete`. The
    /// mapping is its own inverse, so it serves reads and writes.
    pub fn translate(self, flag: bool) -> bool {
        match self {
            StatusConvention::CompleteIsTrue => flag,
            StatusConvention::PendingIsTrue => !flag,
        }
    }
}

/// Per-entity status conventions; unknown values fail while parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConventionsConfig {
    #[serde(default)]
    pub task_status: StatusConvention,

    #[serde(default)]
    pub header_status: StatusConvention,

    #[serde(default)]
    pub service_status: StatusConvention,
}

/// Conventions for the three stores, as the HTTP store consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conventions {
    pub task: StatusConvention,
    pub header: StatusConvention,
    pub service: StatusConvention,
}

impl ConventionsConfig {
    pub fn resolve(&self) -> Conventions {
        Conventions {
            task: self.task_status,
            header: self.header_status,
            service: self.service_status,
        }
    }
}

impl Config {
    /// Load configuration from a `glaura.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration using the lookup order above.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            return Self::load(path);
        }

        let local = PathBuf::from(CONFIG_FILENAME);
        if local.exists() {
            return Self::load(&local);
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "api.base_url cannot be empty".to_string(),
            ));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(Error::InvalidConfig(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "api.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.session.user.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "session.user cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Path of `glaura.toml` in the platform config directory.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "glaura")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}
