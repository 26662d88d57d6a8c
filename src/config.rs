// ⚙️ Configuration
// Optional JSON config file, every field defaulted, env overrides on top

use crate::rules::NormalizationRuleSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Path of the JSON config file
pub const CONFIG_ENV: &str = "GENEALOGY_STATS_CONFIG";

/// Overrides `store.path`
pub const DB_PATH_ENV: &str = "GENEALOGY_STATS_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    /// JSON rule table replacing the built-in Russian rules
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    /// Default number of snapshot dates in a comparison
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default)]
    pub journal_mode: JournalMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub fn pragma_value(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/statistics.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_history_limit() -> usize {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
        }
    }
}

impl StoreConfig {
    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        StoreConfig {
            path: path.as_ref().to_path_buf(),
            ..StoreConfig::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            store: StoreConfig::default(),
            rules_path: None,
            history_limit: default_history_limit(),
        }
    }
}

impl AppConfig {
    /// Config file named by `GENEALOGY_STATS_CONFIG` (defaults otherwise),
    /// then `GENEALOGY_STATS_DB`
    pub fn load() -> Result<Self> {
        let config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        Ok(config.with_db_override(env::var_os(DB_PATH_ENV).map(PathBuf::from)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))
    }

    pub fn with_db_override(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) {
            self.store.path = path;
        }
        self
    }

    /// Rule table from `rules_path`, or the built-in one
    pub fn rules(&self) -> Result<NormalizationRuleSet> {
        match &self.rules_path {
            Some(path) => NormalizationRuleSet::from_file(path),
            None => Ok(NormalizationRuleSet::default()),
        }
    }
}
