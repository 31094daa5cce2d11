use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use suggest_core::{DEFAULT_CANDIDATE_WINDOW, DEFAULT_COLLECTION_KEY, DEFAULT_LIMIT};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path();
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config file {}", config_path.display()))?;
            let parsed: DaemonConfig = toml::from_str(&raw)
                .with_context(|| format!("failed to parse TOML from {}", config_path.display()))?;
            parsed.validate()?;
            return Ok(parsed);
        }

        Ok(DaemonConfig::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranker.collection_key.is_empty() {
            bail!("ranker.collection_key must not be empty");
        }
        if self.ranker.candidate_window == 0 {
            bail!("ranker.candidate_window must be at least 1");
        }
        if self.store.backend == StoreBackend::Redis && self.store.redis_url.trim().is_empty() {
            bail!("store.backend is redis but store.redis_url is empty");
        }
        Ok(())
    }
}

fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var("SUGGESTD_CONFIG") {
        return Path::new(&path).to_path_buf();
    }

    if let Some(base) = dirs::config_dir() {
        return base.join("suggestd").join("config.toml");
    }

    Path::new("/tmp/suggestd.toml").to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    Path::new("/tmp/suggestd.sock").to_path_buf()
}

fn default_request_timeout_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: default_redis_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankerConfig {
    #[serde(default = "default_collection_key")]
    pub collection_key: String,
    #[serde(default = "default_candidate_window")]
    pub candidate_window: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            collection_key: default_collection_key(),
            candidate_window: default_candidate_window(),
            default_limit: default_limit(),
        }
    }
}

fn default_collection_key() -> String {
    DEFAULT_COLLECTION_KEY.to_string()
}

fn default_candidate_window() -> usize {
    DEFAULT_CANDIDATE_WINDOW
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}
