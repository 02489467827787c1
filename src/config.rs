use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use anyhow::{bail, Context, Result};

use crate::clock::MILLIS_PER_HOUR;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub limits: LimitsConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Firestore(FirestoreConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirestoreConfig {
    #[serde(default = "default_firestore_url")]
    pub firestore_url: String,
    pub project_id: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Thresholds {
    pub subscribed: u32,
    pub not_subscribed: u32,
}

impl Thresholds {
    pub fn for_tier(&self, is_subscribed: bool) -> u32 {
        if is_subscribed {
            self.subscribed
        } else {
            self.not_subscribed
        }
    }
}

/// Rolling window and per-tier thresholds for one limit collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LimitManagerConfig {
    pub duration_in_hours: u64,
    pub thresholds: Thresholds,
}

impl LimitManagerConfig {
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.duration_in_hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(MILLIS_PER_HOUR)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(flatten)]
    pub default: LimitManagerConfig,
    #[serde(default)]
    pub collections: HashMap<String, LimitManagerConfig>,
}

impl LimitsConfig {
    pub fn new(default: LimitManagerConfig) -> Self {
        Self {
            default,
            collections: HashMap::new(),
        }
    }

    pub fn with_collection(mut self, name: impl Into<String>, config: LimitManagerConfig) -> Self {
        self.collections.insert(name.into(), config);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionsConfig {
    #[serde(default)]
    pub subscribed_users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enable: bool,
    pub bind_addr: String,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            bind_addr: "127.0.0.1:9100".to_string(),
            path: "/metrics".to_string(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path))?;

    parse_config(&config_content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .with_context(|| "Failed to parse configuration")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.limits.default.duration_in_hours == 0 {
        bail!("limits.duration_in_hours must be greater than zero");
    }

    for (name, limit) in &config.limits.collections {
        if limit.duration_in_hours == 0 {
            bail!("limits.collections.{}.duration_in_hours must be greater than zero", name);
        }
    }

    if !config.metrics.path.starts_with('/') {
        bail!("metrics.path must start with '/': {}", config.metrics.path);
    }

    if let StoreConfig::Firestore(firestore) = &config.store {
        if firestore.project_id.is_empty() {
            bail!("store.project_id must not be empty for the firestore backend");
        }
    }

    Ok(())
}
