use crate::contracts::MULTICALL3_ADDRESS;
use crate::types::conversions::string_to_address;
use crate::types::ManifestEntry;
use anyhow::Context;
use config::{Config, ConfigError, File, FileFormat};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Batch cap applied to the chains listed in `multicall.capped_chains`.
pub const CAPPED_BATCH_SIZE: usize = 50;

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_meta_base_url() -> String {
    "https://meta.yearn.network/api/".to_string()
}
fn default_meta_refresh_interval_seconds() -> u64 {
    60
}
fn default_meta_request_timeout_seconds() -> u64 {
    30
}
fn default_multicall_interval_seconds() -> u64 {
    60
}
fn default_capped_batch_size() -> usize {
    CAPPED_BATCH_SIZE
}
fn default_capped_chains() -> Vec<u64> {
    vec![1] // Ethereum mainnet
}
fn default_storage_path() -> String {
    "./data/snapshots".to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_metrics_bind() -> String {
    "0.0.0.0:9090".to_string()
}
fn default_multicall_address() -> String {
    MULTICALL3_ADDRESS.to_string()
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[default]
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetaSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prefix of `{base_url}{chain_id}/strategies/all`
    #[serde(default = "default_meta_base_url")]
    pub base_url: String,
    #[serde(default = "default_meta_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_meta_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for MetaSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_meta_base_url(),
            refresh_interval_seconds: default_meta_refresh_interval_seconds(),
            request_timeout_seconds: default_meta_request_timeout_seconds(),
        }
    }
}

impl MetaSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MulticallSettings {
    #[serde(default = "default_multicall_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_capped_batch_size")]
    pub capped_batch_size: usize,
    #[serde(default = "default_capped_chains")]
    pub capped_chains: Vec<u64>,
}

impl Default for MulticallSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_multicall_interval_seconds(),
            capped_batch_size: default_capped_batch_size(),
            capped_chains: default_capped_chains(),
        }
    }
}

impl MulticallSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            redis_url: default_redis_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_bind")]
    pub bind: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_metrics_bind(),
        }
    }
}

/// One tracked strategy of a chain.
#[derive(Debug, Deserialize, Clone)]
pub struct StrategySettings {
    pub vault: String,
    pub strategy: String,
    /// `apiVersion` of the vault; empty means the current interface
    #[serde(default)]
    pub vault_version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    pub chain_id: u64,
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,
    /// Overrides the capped/unbounded default for this chain
    #[serde(default)]
    pub max_batch_size: Option<usize>,
    #[serde(default)]
    pub strategies: Vec<StrategySettings>,
}

impl ChainSettings {
    pub fn multicall_address(&self) -> anyhow::Result<Address> {
        string_to_address(&self.multicall_address)
            .with_context(|| format!("Invalid multicall address for chain {}", self.chain_id))
    }

    pub fn manifest_entries(&self) -> anyhow::Result<Vec<ManifestEntry>> {
        self.strategies
            .iter()
            .map(|s| {
                let vault = string_to_address(&s.vault)
                    .with_context(|| format!("Invalid vault address {:?} on chain {}", s.vault, self.chain_id))?;
                let strategy = string_to_address(&s.strategy).with_context(|| {
                    format!("Invalid strategy address {:?} on chain {}", s.strategy, self.chain_id)
                })?;
                Ok(ManifestEntry::new(self.chain_id, vault, strategy, s.vault_version.as_str()))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub meta: MetaSettings,
    #[serde(default)]
    pub multicall: MulticallSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub chains: Vec<ChainSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path("Config.toml")
    }

    /// Loads `path` and applies the `SDK_*` environment overrides.
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder().add_source(File::with_name(path)).build()?;
        let mut settings: Self = s.try_deserialize()?;
        settings.apply_overrides(|name| env::var(name).ok());
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Environment overrides. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = non_empty("SDK_META_BASE_URL") {
            self.meta.base_url = url;
        }
        if let Some(path) = non_empty("SDK_STORAGE_PATH") {
            self.storage.path = path;
        }
        if let Some(url) = non_empty("SDK_REDIS_URL") {
            self.storage.redis_url = url;
        }
        for chain in &mut self.chains {
            if let Some(url) = non_empty(&format!("SDK_RPC_URL_{}", chain.chain_id)) {
                chain.rpc_url = url;
            }
        }
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainSettings> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Explicit per-chain override, else the capped size for capped chains,
    /// else unbounded.
    pub fn batch_size_for(&self, chain_id: u64) -> usize {
        if let Some(size) = self.chain(chain_id).and_then(|c| c.max_batch_size) {
            return size.max(1);
        }
        if self.multicall.capped_chains.contains(&chain_id) {
            return self.multicall.capped_batch_size.max(1);
        }
        usize::MAX
    }
}
