//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. the CLI's `--config <path>`)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Every field has a default, so an empty file (or [`Config::default()`]) is
//! a valid configuration. [`Config::apply_env()`] overlays `HUGINN_*`
//! environment variables on top of whatever was loaded.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::{HuginnError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Batch coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Maximum items per submission (default: 10).
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Worker slots used when a submission does not specify one (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Overall wall-clock budget per batch in seconds (default: 300).
    #[serde(default = "default_batch_timeout")]
    pub timeout_secs: u64,
    /// Completed batches retained in history (default: 100).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// History entries reported by status queries (default: 5).
    #[serde(default = "default_status_history_limit")]
    pub status_history_limit: usize,
    /// Frameworks applied when neither the item nor the batch names any.
    #[serde(default = "default_frameworks")]
    pub default_frameworks: Vec<String>,
    /// Cache instance holding analysis results (default: "analysis").
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            workers: default_workers(),
            timeout_secs: default_batch_timeout(),
            history_limit: default_history_limit(),
            status_history_limit: default_status_history_limit(),
            default_frameworks: default_frameworks(),
            cache_name: default_cache_name(),
        }
    }
}

impl BatchConfig {
    /// Overall batch timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_max_batch_size() -> usize {
    10
}

fn default_workers() -> usize {
    4
}

fn default_batch_timeout() -> u64 {
    300
}

fn default_history_limit() -> usize {
    100
}

fn default_status_history_limit() -> usize {
    5
}

fn default_frameworks() -> Vec<String> {
    ["IDEAL", "STEPPS", "E-E-A-T", "GDocP"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_name() -> String {
    "analysis".to_string()
}

/// Defaults applied to every cache instance created from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Maximum entries per instance (default: 50).
    #[serde(default = "default_cache_size")]
    pub max_size: usize,
    /// Default time-to-live in seconds (default: 3600).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Mirror instances to disk snapshots (default: false).
    #[serde(default)]
    pub persistence_enabled: bool,
    /// Directory holding `<instance>.json` snapshots.
    #[serde(default)]
    pub persistence_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: default_cache_size(),
            ttl_secs: default_cache_ttl(),
            persistence_enabled: false,
            persistence_dir: None,
        }
    }
}

fn default_cache_size() -> usize {
    50
}

fn default_cache_ttl() -> u64 {
    3600
}

impl CacheSettings {
    /// Snapshot directory: configured path, else `<user cache dir>/huginn`,
    /// else `<temp dir>/huginn`.
    pub fn resolved_persistence_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.persistence_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("huginn")
    }

    /// Instance configuration for the cache called `name`.
    pub fn instance_config(&self, name: &str) -> CacheConfig {
        let config = CacheConfig::new()
            .max_size(self.max_size)
            .ttl(Duration::from_secs(self.ttl_secs));
        if self.persistence_enabled {
            config.persist_to(self.resolved_persistence_dir().join(format!("{name}.json")))
        } else {
            config
        }
    }
}

/// Environment variables read by [`Config::apply_env`].
const ENV_VARS: &[&str] = &[
    "HUGINN_BATCH_MAX_SIZE",
    "HUGINN_BATCH_WORKERS",
    "HUGINN_BATCH_TIMEOUT",
    "HUGINN_CACHE_SIZE",
    "HUGINN_CACHE_TTL",
    "HUGINN_CACHE_PERSIST",
    "HUGINN_CACHE_PATH",
];

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but defaults when no config file exists.
    ///
    /// A file that exists but cannot be read or parsed is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        if explicit_path.is_some() {
            return Self::load(explicit_path);
        }
        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Defaults overlaid with `HUGINN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `HUGINN_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary lookup (the environment in production).
    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        for &name in ENV_VARS {
            let Some(raw) = lookup(name) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match name {
                "HUGINN_BATCH_MAX_SIZE" => self.batch.max_batch_size = parse_var(name, raw)?,
                "HUGINN_BATCH_WORKERS" => self.batch.workers = parse_var(name, raw)?,
                "HUGINN_BATCH_TIMEOUT" => self.batch.timeout_secs = parse_var(name, raw)?,
                "HUGINN_CACHE_SIZE" => self.cache.max_size = parse_var(name, raw)?,
                "HUGINN_CACHE_TTL" => self.cache.ttl_secs = parse_var(name, raw)?,
                "HUGINN_CACHE_PERSIST" => {
                    self.cache.persistence_enabled = raw.eq_ignore_ascii_case("true")
                }
                "HUGINN_CACHE_PATH" => self.cache.persistence_dir = Some(PathBuf::from(raw)),
                _ => {}
            }
        }
        Ok(())
    }

    /// Human-readable warnings for values that are legal but suspicious.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.cache.max_size < 10 {
            warnings.push(format!(
                "Cache size ({}) is very small, consider increasing",
                self.cache.max_size
            ));
        } else if self.cache.max_size > 1000 {
            warnings.push(format!(
                "Cache size ({}) is very large, consider reducing",
                self.cache.max_size
            ));
        }

        if self.cache.ttl_secs < 60 {
            warnings.push(format!("Cache TTL ({}s) is very short", self.cache.ttl_secs));
        } else if self.cache.ttl_secs > 86_400 {
            warnings.push(format!("Cache TTL ({}s) is very long", self.cache.ttl_secs));
        }

        if self.batch.max_batch_size < 1 {
            warnings.push("Batch max size cannot be less than 1".to_string());
        } else if self.batch.max_batch_size > 100 {
            warnings.push(format!(
                "Batch max size ({}) is very large",
                self.batch.max_batch_size
            ));
        }

        if self.batch.workers < 1 {
            warnings.push("Batch workers cannot be less than 1".to_string());
        } else if self.batch.workers > 32 {
            warnings.push(format!(
                "Batch workers ({}) may be excessive",
                self.batch.workers
            ));
        }

        warnings
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Self::find_config_file().ok_or_else(|| {
            HuginnError::Configuration(
                "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                    .to_string(),
            )
        })
    }

    /// First existing file among the user and system locations.
    fn find_config_file() -> Option<PathBuf> {
        let user_config = dirs::home_dir().map(|home| home.join(".huginn").join("config.toml"));
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        user_config
            .into_iter()
            .chain(std::iter::once(system_config))
            .find(|path| path.exists())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        HuginnError::Configuration(format!("Environment variable {name} has invalid value '{raw}'"))
    })
}
