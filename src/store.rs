use crate::kv_store::{self, KeyValueStore};
use crate::metrics;
use crate::types::conversions::string_to_address;
use crate::types::{StrategyMeta, StrategyMulticallData};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ethers::prelude::Address;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Logical key of the per-network on-chain snapshot in the key-value store.
pub const SNAPSHOT_KEY: &str = "StrategiesMultiCallData";

pub type NetworkSnapshot = HashMap<Address, StrategyMulticallData>;

/// Process-wide state shared by the aggregation passes and the metadata
/// refreshers.
///
/// The on-chain region holds one immutable snapshot per network, swapped as a
/// whole at the end of each pass. The metadata region is merged entry by entry
/// and never pruned.
pub struct AggregationStore {
    multicall: DashMap<u64, Arc<NetworkSnapshot>>,
    meta: DashMap<u64, HashMap<Address, StrategyMeta>>,
    meta_refreshed_at: DashMap<u64, DateTime<Utc>>,
    backend: Arc<dyn KeyValueStore>,
}

impl AggregationStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            multicall: DashMap::new(),
            meta: DashMap::new(),
            meta_refreshed_at: DashMap::new(),
            backend,
        }
    }

    pub fn replace_network_snapshot(&self, chain_id: u64, snapshot: NetworkSnapshot) {
        let records = snapshot.len();
        self.multicall.insert(chain_id, Arc::new(snapshot));
        metrics::set_strategy_records(chain_id, records);
        debug!("Replaced snapshot for chain {} ({} strategies)", chain_id, records);
    }

    pub fn get(&self, chain_id: u64, strategy: &Address) -> Option<StrategyMulticallData> {
        self.multicall
            .get(&chain_id)
            .and_then(|snapshot| snapshot.get(strategy).cloned())
    }

    /// Whole snapshot of the last pass. Holding the `Arc` keeps it stable even
    /// if a newer pass replaces it meanwhile.
    pub fn network_snapshot(&self, chain_id: u64) -> Option<Arc<NetworkSnapshot>> {
        self.multicall.get(&chain_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.multicall.iter().map(|entry| *entry.key()).collect();
        chains.sort_unstable();
        chains
    }

    /// Writes the current snapshot of `chain_id` to the backend.
    /// Returns false when there was nothing to write or the write failed.
    pub async fn persist(&self, chain_id: u64) -> bool {
        let Some(snapshot) = self.network_snapshot(chain_id) else {
            debug!("No snapshot to persist for chain {}", chain_id);
            return false;
        };
        match kv_store::save_value(self.backend.as_ref(), SNAPSHOT_KEY, chain_id, snapshot.as_ref()).await {
            Ok(()) => {
                debug!("💾 Persisted {} strategies for chain {}", snapshot.len(), chain_id);
                true
            }
            Err(e) => {
                error!("❌ Failed to persist snapshot for chain {}: {}", chain_id, e);
                false
            }
        }
    }

    pub async fn persist_all(&self) -> usize {
        let mut persisted = 0;
        for chain_id in self.chains() {
            if self.persist(chain_id).await {
                persisted += 1;
            }
        }
        persisted
    }

    /// Seeds memory from the last persisted snapshot. A missing or empty
    /// snapshot leaves memory untouched and returns false.
    pub async fn reload(&self, chain_id: u64) -> bool {
        let snapshot: NetworkSnapshot =
            match kv_store::load_value(self.backend.as_ref(), SNAPSHOT_KEY, chain_id).await {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_not_found() => {
                    warn!("⚠️ No stored snapshot for chain {} ({})", chain_id, e);
                    return false;
                }
                Err(e) => {
                    error!("❌ Failed to load snapshot for chain {}: {}", chain_id, e);
                    return false;
                }
            };

        if snapshot.is_empty() {
            debug!("Stored snapshot for chain {} is empty, ignoring", chain_id);
            return false;
        }

        info!("✅ Reloaded {} strategies for chain {}", snapshot.len(), chain_id);
        self.replace_network_snapshot(chain_id, snapshot);
        true
    }

    /// Indexes each record under every address it lists. Existing entries are
    /// overwritten, others are kept. Returns the number of addresses written.
    pub fn merge_meta(&self, chain_id: u64, records: Vec<StrategyMeta>) -> usize {
        let mut written = 0;
        let mut region = self.meta.entry(chain_id).or_default();
        for record in records {
            for raw in &record.addresses {
                match string_to_address(raw) {
                    Ok(address) => {
                        region.insert(address, record.clone());
                        written += 1;
                    }
                    Err(_) => debug!("Skipping unparsable meta address {:?} on chain {}", raw, chain_id),
                }
            }
        }
        let total = region.len();
        drop(region);

        self.meta_refreshed_at.insert(chain_id, Utc::now());
        metrics::set_meta_records(chain_id, total);
        written
    }

    pub fn get_meta(&self, chain_id: u64, strategy: &Address) -> Option<StrategyMeta> {
        self.meta
            .get(&chain_id)
            .and_then(|region| region.get(strategy).cloned())
    }

    /// Lookup by textual address, in any letter case.
    pub fn get_meta_by_str(&self, chain_id: u64, strategy: &str) -> Option<StrategyMeta> {
        let address = string_to_address(strategy).ok()?;
        self.get_meta(chain_id, &address)
    }

    pub fn meta_len(&self, chain_id: u64) -> usize {
        self.meta.get(&chain_id).map(|region| region.len()).unwrap_or(0)
    }

    pub fn meta_refreshed_at(&self, chain_id: u64) -> Option<DateTime<Utc>> {
        self.meta_refreshed_at.get(&chain_id).map(|at| *at)
    }
}
