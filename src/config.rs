//! Planner settings
//!
//! Settings come from an optional TOML file; the remote secret can also be
//! supplied through the environment so it never has to be written to disk.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const API_KEY_ENV: &str = "FACTORY_PLANNER_API_KEY";
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://api.jsonbin.io/v3";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_REMOTE_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file gives defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply the environment override for the remote secret
    pub fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.remote.api_key = Some(key);
            }
        }
        self
    }
}
