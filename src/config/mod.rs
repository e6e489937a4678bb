//! # Configuration Management Module
//!
//! Loads and writes the TOML configuration used by the `evolvex` binary and
//! handed to [`crate::progression::Engine`].
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - where the sled database lives
//! - [`LoggingConfig`] - log level and optional log files
//! - [`SecurityConfig`] - Argon2 cost parameters for password hashing
//! - [`RulesConfig`] - tunable progression rules (leaderboard size, penalties, dungeon limits)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use evolvex::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Data dir: {}", config.storage.data_dir);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//! file = "evolvex.log"
//!
//! [security.argon2]
//! memory_kib = 19456
//! time_cost = 2
//! parallelism = 1
//!
//! [rules]
//! leaderboard_size = 10
//! inactivity_penalty_days = 2
//! enforce_dungeon_min_level = true
//! max_damage_per_hit = 1000
//! default_rest_amount = 20
//! ```
//!
//! Every section and field is optional; missing values take the defaults shown.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl StorageConfig {
    /// Directory holding the sled database.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("evolvex.db")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("evolvex.log".to_string()),
            security_file: Some("evolvex-security.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

/// Tunable progression rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RulesConfig {
    /// Entries returned by the leaderboard.
    pub leaderboard_size: usize,
    /// Whole days away before a login costs one level.
    pub inactivity_penalty_days: i64,
    pub enforce_dungeon_min_level: bool,
    /// Largest single damage report accepted against a dungeon boss.
    pub max_damage_per_hit: u32,
    /// Stamina restored by a rest without an explicit amount.
    pub default_rest_amount: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            leaderboard_size: 10,
            inactivity_penalty_days: 2,
            enforce_dungeon_min_level: true,
            max_damage_per_hit: 1000,
            default_rest_amount: 20,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.rules.leaderboard_size == 0 {
            return Err(anyhow!("rules.leaderboard_size must be at least 1"));
        }
        if self.rules.inactivity_penalty_days < 1 {
            return Err(anyhow!("rules.inactivity_penalty_days must be at least 1"));
        }
        if self.rules.max_damage_per_hit == 0 {
            return Err(anyhow!("rules.max_damage_per_hit must be at least 1"));
        }
        Ok(())
    }
}
