// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::fuel::FuelPolicyConfig;
use crate::weather::{CACHE_TTL_SECS, METAR_URL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

fn default_debounce_ms() -> u64 {
    400
}

fn default_remote_timeout_secs() -> u64 {
    20
}

fn default_metar_url() -> String {
    METAR_URL.to_string()
}

fn default_metar_ttl() -> u64 {
    CACHE_TTL_SECS
}

/// Application settings persisted as `config.json` in the config root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub fuel: FuelPolicyConfig,
    /// Quiet period after the last plan edit before recomputing.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Base URL of a remote navlog service; local computation when unset.
    #[serde(default)]
    pub remote_endpoint: Option<String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    #[serde(default = "default_metar_url")]
    pub metar_url: String,
    #[serde(default = "default_metar_ttl")]
    pub metar_cache_ttl_secs: u64,
    /// Overrides `<config root>/metars.cache.csv`.
    #[serde(default)]
    pub metar_cache_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            fuel: FuelPolicyConfig::default(),
            debounce_ms: default_debounce_ms(),
            remote_endpoint: None,
            remote_timeout_secs: default_remote_timeout_secs(),
            metar_url: default_metar_url(),
            metar_cache_ttl_secs: default_metar_ttl(),
            metar_cache_file: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        crate::get_config_root().join("config.json")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn metar_cache_path(&self) -> PathBuf {
        self.metar_cache_file
            .clone()
            .unwrap_or_else(|| crate::get_config_root().join("metars.cache.csv"))
    }

    /// Loads the config, returning defaults when the file is absent.
    ///
    /// A file from an older schema is replaced by defaults. An invalid fuel
    /// policy falls back to the default policy.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file found; using defaults — path={}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        if config.schema_version < CURRENT_SCHEMA_VERSION {
            log::info!(
                "Config schema outdated; resetting to defaults — from={} to={}",
                config.schema_version,
                CURRENT_SCHEMA_VERSION
            );
            config = AppConfig::default();
            if let Err(e) = config.save(path) {
                log::warn!("Could not write migrated config — path={} error={}", path.display(), e);
            }
        }

        if let Err(e) = config.fuel.validate() {
            log::warn!("Invalid fuel policy in config; using defaults — error={}", e);
            config.fuel = FuelPolicyConfig::default();
        }

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config")
    }
}
