use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use platter_core::cache::DEFAULT_WINDOW_SIZE;

const CONFIG_FILE: &str = "config.json";

fn default_api_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Deduct eaten items from the pantry.
    #[serde(default)]
    pub auto_deduct: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_id: default_user_id(),
            api_token: None,
            window_size: default_window_size(),
            auto_deduct: false,
        }
    }
}

impl Config {
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "platter").context("Could not determine home directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load() -> Result<Self> {
        let data_dir = Self::data_dir()?;
        Self::load_from(&data_dir.join(CONFIG_FILE))
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size < 3 || self.window_size % 2 == 0 {
            bail!(
                "window_size must be odd and at least 3 (got {})",
                self.window_size
            );
        }
        if self.user_id.trim().is_empty() {
            bail!("user_id must not be empty");
        }
        Ok(())
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, api_url: Option<String>, user: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.api_url = url;
        }
        if let Some(user) = user {
            self.user_id = user;
        }
        self
    }
}
