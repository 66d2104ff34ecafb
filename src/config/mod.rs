//! Configuration loading and validation
//!
//! TOML file with serde defaults for every field, so an empty file and no
//! file at all both yield a working setup. Environment variables override
//! the file for deployment-specific settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CustodianError, Result};
use crate::scoring::ScoringConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub github: GithubConfig,
    pub cache: CacheConfig,
    pub batch: BatchConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for the score database and cloned repositories
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("custodian");
        Self { data_dir }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API token; the GITHUB_TOKEN environment variable takes precedence
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cached current scores older than this are recalculated
    pub freshness_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { freshness_days: 7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Packages analyzed concurrently in batch mode
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("custodian")
            .join("config.toml")
    }

    /// Load configuration.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// path silently falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CustodianError::ConfigNotFound {
                        path: p.to_path_buf(),
                    });
                }
                Self::read(p)?
            }
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::read(&default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CustodianError::Io {
            source: e,
            context: format!("Failed to read config: {:?}", path),
        })?;
        Ok(toml::from_str(&text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("CUSTODIAN_DATA_DIR") {
            if !dir.is_empty() {
                self.storage.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                self.github.token = Some(token);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            return Err(CustodianError::InvalidConfigValue {
                path: "batch.concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let s = &self.scoring;
        for (name, value) in [
            ("scoring.concentration_low", s.concentration_low),
            ("scoring.concentration_moderate", s.concentration_moderate),
            ("scoring.concentration_high", s.concentration_high),
            ("scoring.concentration_critical", s.concentration_critical),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CustodianError::InvalidConfigValue {
                    path: name.to_string(),
                    message: format!("{value} is outside 0-100"),
                });
            }
        }
        if s.concentration_low >= s.concentration_moderate
            || s.concentration_moderate >= s.concentration_high
            || s.concentration_high >= s.concentration_critical
        {
            return Err(CustodianError::InvalidConfigValue {
                path: "scoring".to_string(),
                message: "concentration thresholds must be strictly increasing".to_string(),
            });
        }
        Ok(())
    }

    /// Write the current configuration, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CustodianError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| CustodianError::Io {
            source: e,
            context: format!("Failed to write config: {:?}", path),
        })
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.storage.data_dir.join("scores.db")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.storage.data_dir.join("repos")
    }
}
