use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::client::{ClientBuilder, DEFAULT_TIMEOUT};

/// Where to ask for UV data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

/// Settings stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// request_retries = 3
///
/// [location]
/// latitude = 39.7974509
/// longitude = -104.8887227
/// altitude = 1609.3
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Total attempts per request; `0` disables retries.
    pub request_retries: Option<u32>,

    #[serde(default)]
    pub check_status_before_request: bool,

    pub timeout_secs: Option<u64>,

    pub location: Option<Location>,
}

impl Config {
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `openuv configure` or set OPENUV_API_KEY."
            )
        })
    }

    pub fn location(&self) -> Result<Location> {
        self.location.ok_or_else(|| {
            anyhow!(
                "No location configured.\n\
                 Hint: run `openuv configure` or pass --lat and --lng."
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Start a client builder from the stored settings.
    pub fn client_builder(&self) -> Result<ClientBuilder> {
        let location = self.location()?;

        let mut builder = ClientBuilder::new(self.api_key()?, location.latitude, location.longitude)
            .altitude(location.altitude)
            .timeout(self.timeout())
            .check_status_before_request(self.check_status_before_request);

        match self.request_retries {
            Some(0) => builder = builder.retries_enabled(false),
            Some(n) => builder = builder.request_retries(n),
            None => {}
        }

        Ok(builder)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("io", "openuv", "openuv-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
