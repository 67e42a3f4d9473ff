//! Aggregation pass driver
//!
//! One [`StrategyAggregator`] per network: reads the manifest, builds the calls,
//! runs them through the [`BatchExecutor`], decodes the answers and swaps the
//! network snapshot in the [`AggregationStore`].

use crate::call_builder::build_manifest_calls;
use crate::decoder::decode_strategies;
use crate::manifest::ManifestSource;
use crate::metrics;
use crate::multicall::{BatchError, BatchExecutor, BatchTransport};
use crate::scheduler::Shutdown;
use crate::store::AggregationStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const DEFAULT_PASS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("failed to load manifest: {0}")]
    Manifest(#[source] anyhow::Error),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// No calls to issue; the store was left untouched
    NothingToDo,
    Completed {
        strategies: usize,
        calls: usize,
        batches: usize,
        failed_calls: usize,
        persisted: bool,
    },
}

pub struct StrategyAggregator<T: BatchTransport> {
    chain_id: u64,
    executor: BatchExecutor<T>,
    manifest: Arc<dyn ManifestSource>,
    store: Arc<AggregationStore>,
    max_batch_size: usize,
    interval: Duration,
}

impl<T: BatchTransport> StrategyAggregator<T> {
    pub fn new(
        chain_id: u64,
        transport: T,
        manifest: Arc<dyn ManifestSource>,
        store: Arc<AggregationStore>,
    ) -> Self {
        Self {
            chain_id,
            executor: BatchExecutor::new(chain_id, transport),
            manifest,
            store,
            max_batch_size: usize::MAX,
            interval: DEFAULT_PASS_INTERVAL,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    /// Runs one full pass. On a batch-level failure the previous snapshot
    /// stays in place.
    pub async fn run_pass(&self) -> Result<PassOutcome, AggregationError> {
        let start = Instant::now();
        let entries = self
            .manifest
            .entries(self.chain_id)
            .await
            .map_err(AggregationError::Manifest)?;

        let calls = build_manifest_calls(&entries);
        if calls.is_empty() {
            info!(chain_id = self.chain_id, "Nothing to do: no strategies to query");
            return Ok(PassOutcome::NothingToDo);
        }

        let response = self.executor.execute(&calls, self.max_batch_size).await?;
        let snapshot = decode_strategies(&entries, &response.results);
        let strategies = snapshot.len();

        self.store.replace_network_snapshot(self.chain_id, snapshot);
        let persisted = self.store.persist(self.chain_id).await;

        let elapsed = start.elapsed();
        metrics::record_pass_duration(self.chain_id, elapsed);
        info!(
            chain_id = self.chain_id,
            strategies,
            calls = calls.len(),
            batches = response.batches,
            failed_calls = response.failed_calls,
            elapsed_ms = elapsed.as_millis() as u64,
            "✅ Strategy multicall pass complete"
        );

        Ok(PassOutcome::Completed {
            strategies,
            calls: calls.len(),
            batches: response.batches,
            failed_calls: response.failed_calls,
            persisted,
        })
    }

    /// Runs passes every `interval` until shutdown. Failed passes are logged
    /// and the loop carries on.
    pub async fn run(self: Arc<Self>, mut shutdown: Shutdown) {
        info!(
            chain_id = self.chain_id,
            interval_secs = self.interval.as_secs(),
            "🔄 Strategy aggregator started"
        );
        while !shutdown.is_triggered() {
            if let Err(e) = self.run_pass().await {
                error!(chain_id = self.chain_id, error = %e, "❌ Strategy multicall pass failed");
            }
            if !shutdown.wait_interval(self.interval).await {
                break;
            }
        }
        debug!(chain_id = self.chain_id, "Strategy aggregator stopped");
    }
}
