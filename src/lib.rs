//! # Strategy State SDK
//!
//! Periodic aggregation of on-chain state for Yearn strategy contracts across
//! several networks, merged with the published strategy metadata and cached for
//! low-latency reads.
//!
//! ## Overview
//!
//! Each network runs two independent tasks that write into disjoint regions of
//! one [`AggregationStore`]:
//!
//! - **Aggregation pass**: builds seven read-only calls per tracked strategy,
//!   executes them in bounded Multicall3 batches and decodes the answers into a
//!   [`StrategyMulticallData`] record, following the interface version of the
//!   parent vault.
//! - **Metadata refresh**: pulls the strategies meta document and indexes it by
//!   strategy address.
//!
//! ## Architecture
//!
//! ### Call & Decode Layer
//! [`call_builder`] produces encoded call descriptors, [`multicall`] partitions
//! and executes them, [`decoder`] maps raw values onto records. A call that
//! reverts or returns a layout the decoder does not expect leaves its fields at
//! their defaults; it never fails the pass.
//!
//! ### State Layer
//! [`store`] keeps one immutable snapshot per network, replaced as a whole at the
//! end of every pass, and persists it through a [`kv_store::KeyValueStore`] so a
//! restart can serve the last known state before the first live pass.
//!
//! ### Process Layer
//! [`aggregator`] and [`meta_refresher`] are the periodic tasks; [`scheduler`]
//! provides cooperative shutdown and the start-up barrier.

// Core Types
/// Domain types: manifest entries, records, raw call results
pub mod types;
/// Read-only contract ABIs
pub mod contracts;

// Call & Decode Layer
/// Call descriptor construction
pub mod call_builder;
/// Batched Multicall3 execution
pub mod multicall;
/// Version-aware result decoding
pub mod decoder;

// State Layer
/// Durable key-value storage backends
pub mod kv_store;
/// In-memory per-network state and snapshot persistence
pub mod store;
/// Tracked strategies per network
pub mod manifest;

// Process Layer
/// Per-network aggregation pass driver
pub mod aggregator;
/// Strategy metadata refresher
pub mod meta_refresher;
/// Shutdown and start-up coordination
pub mod scheduler;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use aggregator::{AggregationError, PassOutcome, StrategyAggregator};
pub use manifest::{ManifestSource, StaticManifest};
pub use meta_refresher::MetaStrategiesRefresher;
pub use multicall::{BatchExecutor, BatchTransport, Multicall3Transport};
pub use settings::Settings;
pub use store::AggregationStore;
pub use types::{ManifestEntry, StrategyMeta, StrategyMulticallData, VaultVersion};
