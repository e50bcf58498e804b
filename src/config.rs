use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upstream: UpstreamConfig,
    pub embedding: EmbeddingConfig,
    pub cache: FreshnessConfig,
    pub ttl: AdaptiveTtlConfig,
    pub response: ResponseConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub timeout_secs: u64,
    pub default_fields: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

/// Fixed TTL defaults per entity kind, plus the counter buffer size.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FreshnessConfig {
    pub issue_ttl_secs: i64,
    pub sprint_ttl_secs: i64,
    pub search_ttl_secs: i64,
    pub counter_flush_threshold: usize,
}

/// Status-driven freshness budgets for issues.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdaptiveTtlConfig {
    pub terminal_secs: i64,
    pub active_secs: i64,
    pub terminal_statuses: Vec<String>,
    pub active_statuses: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResponseConfig {
    pub max_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
            embedding: EmbeddingConfig::default(),
            cache: FreshnessConfig::default(),
            ttl: AdaptiveTtlConfig::default(),
            response: ResponseConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_cache_dir()
            .join("cache.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: String::new(),
            api_token: String::new(),
            timeout_secs: 30,
            default_fields: [
                "summary",
                "status",
                "assignee",
                "issuetype",
                "priority",
                "labels",
                "parent",
                "duedate",
                "description",
                "customfield_10015",
                "customfield_10020",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_cache_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            enabled: true,
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            issue_ttl_secs: 1800,
            sprint_ttl_secs: 3600,
            search_ttl_secs: 900,
            counter_flush_threshold: 50,
        }
    }
}

impl Default for AdaptiveTtlConfig {
    fn default() -> Self {
        let to_owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            terminal_secs: 86_400,
            active_secs: 300,
            terminal_statuses: to_owned(&[
                "done",
                "closed",
                "resolved",
                "released",
                "cancelled",
                "won't do",
            ]),
            active_statuses: to_owned(&[
                "in progress",
                "in review",
                "code review",
                "testing",
                "in development",
                "blocked",
            ]),
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self { max_chars: 50_000 }
    }
}

/// Returns `~/.jira-cache/`
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".jira-cache")
}

/// Returns the default config file path: `~/.jira-cache/config.toml`
pub fn default_config_path() -> PathBuf {
    default_cache_dir().join("config.toml")
}

impl CacheConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CacheConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("JIRA_CACHE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("JIRA_CACHE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("JIRA_BASE_URL") {
            self.upstream.base_url = val;
        }
        if let Ok(val) = std::env::var("JIRA_EMAIL") {
            self.upstream.email = val;
        }
        if let Ok(val) = std::env::var("JIRA_API_TOKEN") {
            self.upstream.api_token = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
