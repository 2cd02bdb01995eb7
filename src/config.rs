use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::client::DEFAULT_TIMEOUT;
use crate::conversation::ErrorDisplay;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub timeout_secs: u64,
    /// Send a per-session `threadId` with every message.
    pub thread_ids: bool,
    pub error_display: ErrorDisplay,
    pub bot_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            thread_ids: true,
            error_display: ErrorDisplay::default(),
            bot_name: "KIRA".to_string(),
        }
    }
}

/// Values taken from the command line or environment, applied over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub no_thread_id: bool,
    pub error_display: Option<ErrorDisplay>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.api_url {
            self.api_url = Some(url);
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = secs;
        }
        if overrides.no_thread_id {
            self.thread_ids = false;
        }
        if let Some(display) = overrides.error_display {
            self.error_display = display;
        }
        self
    }

    pub fn api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow!("No API URL configured. Set KIRA_API_URL, pass --api-url, or add api_url to the config file"))
    }

    /// Request timeout. Zero would fail every request immediately, so the
    /// floor is one second.
    pub fn timeout(&self) -> Duration {
        if self.timeout_secs == 0 {
            tracing::warn!("timeout_secs is 0, using 1");
        }
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("kira").join("config.json"))
    }
}
