//! Configuration system for mnemo.
//!
//! Resolution order: command-line flags (applied by the daemon) →
//! environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MNEMO_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/mnemo/config.toml
//!   3. ~/.config/mnemo/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    pub network: NetworkConfig,
    pub arena: ArenaConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP port the daemon listens on.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Arena capacity in mebibytes. Bytes = mem_size_mb × 1024 × 1024.
    pub mem_size_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Directory for the action log. Relative paths are resolved against
    /// the executable's directory. Empty disables the journal.
    pub dump_folder: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            arena: ArenaConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self { mem_size_mb: 100 }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dump_folder: "dumps".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("mnemo")
}

fn home_or_tmp() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MnemoConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MnemoConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MNEMO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply MNEMO_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MNEMO_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("MNEMO_ARENA__MEM_SIZE_MB") {
            if let Ok(mb) = v.parse() {
                self.arena.mem_size_mb = mb;
            }
        }
        if let Ok(v) = std::env::var("MNEMO_JOURNAL__DUMP_FOLDER") {
            self.journal.dump_folder = v;
        }
    }

    /// Arena capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.arena.mem_size_mb * 1024 * 1024
    }
}
