// Metadata refresher - periodic pull of the Yearn strategies meta document

use crate::metrics;
use crate::scheduler::{ReadySignal, Shutdown};
use crate::store::AggregationStore;
use crate::types::StrategyMeta;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("request failed: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("failed to read body: {0}")]
    Read(#[source] reqwest::Error),
    #[error("failed to parse meta document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// `{base_url}{chain_id}/strategies/all`
pub fn meta_url(base_url: &str, chain_id: u64) -> Result<Url> {
    let raw = format!("{}{}/strategies/all", base_url, chain_id);
    Url::parse(&raw).with_context(|| format!("Invalid meta URL {}", raw))
}

/// Parses the document body: a JSON array of strategy records.
pub fn parse_document(body: &[u8]) -> Result<Vec<StrategyMeta>, MetaError> {
    Ok(serde_json::from_slice(body)?)
}

/// Keeps the metadata region of one network up to date.
pub struct MetaStrategiesRefresher {
    chain_id: u64,
    client: reqwest::Client,
    url: Url,
    store: Arc<AggregationStore>,
    refresh_interval: Duration,
}

impl MetaStrategiesRefresher {
    pub fn new(
        chain_id: u64,
        base_url: &str,
        store: Arc<AggregationStore>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            chain_id,
            client,
            url: meta_url(base_url, chain_id)?,
            store,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        })
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn fetch_document(&self) -> Result<Vec<StrategyMeta>, MetaError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(MetaError::Fetch)?;
        if !response.status().is_success() {
            return Err(MetaError::Status(response.status()));
        }
        let body = response.bytes().await.map_err(MetaError::Read)?;
        parse_document(&body)
    }

    /// One fetch-and-merge cycle. Returns the number of addresses written.
    pub async fn refresh_once(&self) -> Result<usize, MetaError> {
        let start = Instant::now();
        match self.fetch_document().await {
            Ok(records) => {
                let fetched = records.len();
                let written = self.store.merge_meta(self.chain_id, records);
                metrics::increment_meta_refresh(self.chain_id, "ok");
                debug!(
                    "✅ [meta:{}] {} records, {} addresses indexed in {:?}",
                    self.chain_id,
                    fetched,
                    written,
                    start.elapsed()
                );
                Ok(written)
            }
            Err(e) => {
                let outcome = match &e {
                    MetaError::Fetch(_) | MetaError::Status(_) => "fetch_error",
                    MetaError::Read(_) => "read_error",
                    MetaError::Parse(_) => "parse_error",
                };
                metrics::increment_meta_refresh(self.chain_id, outcome);
                Err(e)
            }
        }
    }

    /// Refreshes on every tick until shutdown. `ready` fires after the first
    /// successful cycle; failures are logged and retried on the next tick.
    pub async fn run(self: Arc<Self>, mut ready: ReadySignal, mut shutdown: Shutdown) {
        info!(
            "🚀 Starting meta refresher for chain {} ({}, every {:?})",
            self.chain_id, self.url, self.refresh_interval
        );
        while !shutdown.is_triggered() {
            match self.refresh_once().await {
                Ok(_) => {
                    if ready.fire() {
                        info!(
                            "✅ [meta:{}] first refresh done, {} addresses known",
                            self.chain_id,
                            self.store.meta_len(self.chain_id)
                        );
                    }
                }
                Err(e) => warn!("⚠️ [meta:{}] refresh skipped: {}", self.chain_id, e),
            }
            if !shutdown.wait_interval(self.refresh_interval).await {
                break;
            }
        }
        debug!("Meta refresher for chain {} stopped", self.chain_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_follows_base_chain_layout() {
        let url = meta_url("https://meta.yearn.network/api/", 250).unwrap();
        assert_eq!(url.as_str(), "https://meta.yearn.network/api/250/strategies/all");
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(meta_url("not a url/", 1).is_err());
    }

    #[test]
    fn parses_document_and_ignores_unknown_fields() {
        let body = br#"[
            {
                "name": "StrategyCurve3CrvVoterProxy",
                "description": "Supplies 3CRV to Curve",
                "addresses": ["0x1676055fE954EE6fc388F9096210E5EbE0A9070c"],
                "protocols": ["Curve"],
                "localization": {"en": {"name": "Curve"}},
                "hidden": false
            },
            { "name": "Bare", "addresses": [] }
        ]"#;
        let records = parse_document(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].protocols, vec!["Curve".to_string()]);
        assert!(records[0].localization.is_some());
        assert!(records[1].protocols.is_empty());
        assert!(records[1].description.is_empty());
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = parse_document(b"{\"not\": \"an array\"}").unwrap_err();
        assert!(matches!(err, MetaError::Parse(_)));
    }
}
