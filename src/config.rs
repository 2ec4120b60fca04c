// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{Result, SyncLockError};
use crate::ownership::{FIELD_SEPARATOR, OwnershipTiming};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const HOME_ENV: &str = "SYNCLOCK_HOME";

pub const HEARTBEAT_INTERVAL_ENV: &str = "SYNCLOCK_HEARTBEAT_INTERVAL_MS";
pub const GRACE_PERIOD_ENV: &str = "SYNCLOCK_GRACE_PERIOD_SECS";
pub const STALE_AFTER_ENV: &str = "SYNCLOCK_STALE_AFTER_SECS";
pub const TAKEOVER_TIMEOUT_ENV: &str = "SYNCLOCK_TAKEOVER_TIMEOUT_SECS";

const DEFAULT_RESOURCES: [&str; 2] = ["catch_notes.db", "history.db"];
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 2_000;
const DEFAULT_REASSERT_INTERVAL_MS: u64 = 3_500;
const DEFAULT_GRACE_PERIOD_SECS: u64 = 60;
const DEFAULT_STALE_AFTER_SECS: u64 = 120;
const DEFAULT_TAKEOVER_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_TAKEOVER_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncLockConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ownership: OwnershipConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Folder holding the managed resources. `--dir` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Resource file names; the first one is the primary.
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            resources: default_resources(),
        }
    }
}

fn default_resources() -> Vec<String> {
    DEFAULT_RESOURCES.iter().map(|name| name.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_reassert_interval_ms")]
    pub reassert_interval_ms: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_takeover_poll_interval_ms")]
    pub takeover_poll_interval_ms: u64,
    #[serde(default = "default_takeover_timeout_secs")]
    pub takeover_timeout_secs: u64,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reassert_interval_ms: DEFAULT_REASSERT_INTERVAL_MS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            takeover_poll_interval_ms: DEFAULT_TAKEOVER_POLL_INTERVAL_MS,
            takeover_timeout_secs: DEFAULT_TAKEOVER_TIMEOUT_SECS,
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_reassert_interval_ms() -> u64 {
    DEFAULT_REASSERT_INTERVAL_MS
}

fn default_grace_period_secs() -> u64 {
    DEFAULT_GRACE_PERIOD_SECS
}

fn default_stale_after_secs() -> u64 {
    DEFAULT_STALE_AFTER_SECS
}

fn default_takeover_poll_interval_ms() -> u64 {
    DEFAULT_TAKEOVER_POLL_INTERVAL_MS
}

fn default_takeover_timeout_secs() -> u64 {
    DEFAULT_TAKEOVER_TIMEOUT_SECS
}

impl SyncLockConfig {
    pub fn load(home: &Path) -> Result<Self> {
        let config_path = home.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("Config file not found at {config_path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: SyncLockConfig = toml::from_str(&contents)
            .map_err(|e| SyncLockError::ConfigError(format!("Failed to parse config.toml: {e}")))?;

        log::debug!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        let config_path = home.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| SyncLockError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_u64(HEARTBEAT_INTERVAL_ENV)? {
            self.ownership.heartbeat_interval_ms = value;
        }
        if let Some(value) = env_u64(GRACE_PERIOD_ENV)? {
            self.ownership.grace_period_secs = value;
        }
        if let Some(value) = env_u64(STALE_AFTER_ENV)? {
            self.ownership.stale_after_secs = value;
        }
        if let Some(value) = env_u64(TAKEOVER_TIMEOUT_ENV)? {
            self.ownership.takeover_timeout_secs = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.resources.is_empty() {
            return Err(SyncLockError::InvalidConfig(
                "storage.resources must name at least one file".to_string(),
            ));
        }
        for name in &self.storage.resources {
            if name.trim().is_empty() || name.contains(FIELD_SEPARATOR) {
                return Err(SyncLockError::InvalidConfig(format!(
                    "storage.resources contains an invalid name '{name}'"
                )));
            }
        }

        let ownership = &self.ownership;
        for (key, value) in [
            ("heartbeat_interval_ms", ownership.heartbeat_interval_ms),
            ("reassert_interval_ms", ownership.reassert_interval_ms),
            ("grace_period_secs", ownership.grace_period_secs),
            ("stale_after_secs", ownership.stale_after_secs),
            ("takeover_poll_interval_ms", ownership.takeover_poll_interval_ms),
        ] {
            if value == 0 {
                return Err(SyncLockError::InvalidConfig(format!(
                    "ownership.{key} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    pub fn timing(&self) -> OwnershipTiming {
        OwnershipTiming {
            heartbeat_interval: Duration::from_millis(self.ownership.heartbeat_interval_ms),
            reassert_interval: Duration::from_millis(self.ownership.reassert_interval_ms),
            grace_period: Duration::from_secs(self.ownership.grace_period_secs),
            stale_after: Duration::from_secs(self.ownership.stale_after_secs),
        }
    }

    pub fn takeover_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ownership.takeover_poll_interval_ms)
    }

    pub fn takeover_timeout(&self) -> Duration {
        Duration::from_secs(self.ownership.takeover_timeout_secs)
    }

    /// Folder of the managed resources: `dir` if given, else the configured
    /// `data_dir`, else the working directory.
    pub fn data_dir(&self, dir: Option<&Path>) -> Result<PathBuf> {
        let resolved = match (dir, &self.storage.data_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(configured)) => configured.clone(),
            (None, None) => env::current_dir()?,
        };
        if !resolved.is_dir() {
            return Err(SyncLockError::DirectoryNotFound(
                resolved.display().to_string(),
            ));
        }
        Ok(resolved)
    }

    /// Full paths of the managed resources, primary first.
    pub fn resource_paths(&self, dir: Option<&Path>) -> Result<Vec<PathBuf>> {
        let data_dir = self.data_dir(dir)?;
        Ok(self
            .storage
            .resources
            .iter()
            .map(|name| data_dir.join(name))
            .collect())
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|_| {
            SyncLockError::InvalidConfig(format!("{name} must be an integer, got '{value}'"))
        }),
        Err(_) => Ok(None),
    }
}

/// `SYNCLOCK_HOME`, else `<config dir>/synclock`, else `./.synclock`.
pub fn home_dir() -> PathBuf {
    if let Ok(home) = env::var(HOME_ENV)
        && !home.is_empty()
    {
        return PathBuf::from(home);
    }
    dirs::config_dir()
        .map(|dir| dir.join("synclock"))
        .unwrap_or_else(|| PathBuf::from(".synclock"))
}

/// Loads the configuration the binary runs with: file, then environment.
pub fn new_synclock_config() -> Result<SyncLockConfig> {
    let mut config = SyncLockConfig::load(&home_dir())?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
