//! # Strategy Daemon
//!
//! Long-running service keeping the strategy state of every configured network
//! up to date.
//!
//! ## Overview
//!
//! For each network this service:
//! - Reloads the last persisted snapshot so reads are served immediately
//! - Refreshes the strategies meta document (`meta.refresh_interval_seconds`)
//! - Runs the multicall aggregation pass (`multicall.interval_seconds`)
//! - Flushes every snapshot on Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin strategy_daemon -- --config Config.toml
//! cargo run --bin strategy_daemon -- --chain 1 --chain 250 --once
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use ethers::prelude::{Http, Provider};
use log::{error, info, warn};
use std::sync::Arc;
use strategy_state_sdk::{
    kv_store, metrics,
    scheduler::{shutdown_channel, StartupBarrier},
    settings::{ChainSettings, LogFormat, LogSettings, Settings},
    AggregationStore, MetaStrategiesRefresher, Multicall3Transport, StaticManifest,
    StrategyAggregator,
};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "strategy_daemon", about = "Aggregates Yearn strategy state across networks")]
struct Args {
    /// Path of the TOML configuration file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Only run these chain ids (repeatable); defaults to every configured chain
    #[arg(long = "chain")]
    chains: Vec<u64>,

    /// Run a single reload + refresh + pass per network, persist and exit
    #[arg(long)]
    once: bool,
}

type Aggregator = StrategyAggregator<Multicall3Transport<Provider<Http>>>;

#[cfg(feature = "observability")]
fn init_json_logging(level: &str) -> bool {
    use std::str::FromStr;
    let level = tracing::Level::from_str(level).unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().json().with_max_level(level).init();
    true
}

#[cfg(not(feature = "observability"))]
fn init_json_logging(_level: &str) -> bool {
    false
}

fn init_logging(log: &LogSettings) {
    if log.format == LogFormat::Json && init_json_logging(&log.level) {
        return;
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log.level.as_str())).init();
    if log.format == LogFormat::Json {
        warn!("JSON logs need the 'observability' feature, using plain output");
    }
}

fn build_aggregator(
    settings: &Settings,
    chain: &ChainSettings,
    manifest: Arc<StaticManifest>,
    store: Arc<AggregationStore>,
) -> Result<Aggregator> {
    let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
        .with_context(|| format!("Invalid RPC URL for chain {}", chain.chain_id))?;
    let transport = Multicall3Transport::new(Arc::new(provider), chain.multicall_address()?);
    Ok(StrategyAggregator::new(chain.chain_id, transport, manifest, store)
        .with_max_batch_size(settings.batch_size_for(chain.chain_id))
        .with_interval(settings.multicall.interval()))
}

fn build_refresher(settings: &Settings, chain_id: u64, store: Arc<AggregationStore>) -> Result<MetaStrategiesRefresher> {
    Ok(
        MetaStrategiesRefresher::new(chain_id, &settings.meta.base_url, store, settings.meta.request_timeout())?
            .with_refresh_interval(settings.meta.refresh_interval()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();
    let settings = Settings::from_path(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config))?;
    init_logging(&settings.log);

    info!("🚀 Starting Strategy Daemon");

    if settings.metrics.enabled {
        metrics::install_exporter(&settings.metrics.bind)?;
    }

    let chains: Vec<&ChainSettings> = settings
        .chains
        .iter()
        .filter(|c| args.chains.is_empty() || args.chains.contains(&c.chain_id))
        .collect();
    if chains.is_empty() {
        bail!("No chains to run (configured: {}, filter: {:?})", settings.chains.len(), args.chains);
    }

    // 1. Storage and shared state
    let backend = kv_store::open_backend(&settings.storage).await?;
    let store = Arc::new(AggregationStore::new(backend));
    let manifest = Arc::new(StaticManifest::from_settings(&settings)?);

    // 2. Cold start from the last snapshots
    for chain in &chains {
        store.reload(chain.chain_id).await;
    }

    // 3. Per-chain tasks
    let mut aggregators = Vec::new();
    let mut refreshers = Vec::new();
    for chain in &chains {
        if chain.rpc_url.is_empty() {
            warn!("⚠️ Chain {} has no rpc_url, multicall disabled", chain.chain_id);
        } else {
            aggregators.push(Arc::new(build_aggregator(&settings, chain, manifest.clone(), store.clone())?));
        }
        if settings.meta.enabled {
            refreshers.push(Arc::new(build_refresher(&settings, chain.chain_id, store.clone())?));
        }
    }
    info!(
        "✅ {} aggregators, {} meta refreshers for chains {:?}",
        aggregators.len(),
        refreshers.len(),
        chains.iter().map(|c| c.chain_id).collect::<Vec<_>>()
    );

    if args.once {
        for refresher in &refreshers {
            if let Err(e) = refresher.refresh_once().await {
                warn!("⚠️ Meta refresh failed for {}: {}", refresher.url(), e);
            }
        }
        for aggregator in &aggregators {
            match aggregator.run_pass().await {
                Ok(outcome) => info!("Chain {}: {:?}", aggregator.chain_id(), outcome),
                Err(e) => error!("❌ Chain {}: {}", aggregator.chain_id(), e),
            }
        }
        let persisted = store.persist_all().await;
        info!("💾 Persisted {} snapshots, exiting", persisted);
        return Ok(());
    }

    let (trigger, shutdown) = shutdown_channel();
    let mut barrier = StartupBarrier::new();
    let mut handles = Vec::new();

    for refresher in refreshers {
        let ready = barrier.register(format!("meta:{}", refresher.url()));
        handles.push(tokio::spawn(refresher.run(ready, shutdown.clone())));
    }
    for aggregator in aggregators {
        handles.push(tokio::spawn(aggregator.run(shutdown.clone())));
    }

    // 4. Wait for the first metadata round, or an early Ctrl+C
    let interrupted = tokio::select! {
        ready = barrier.wait() => {
            info!("✅ Metadata ready for {} chains", ready);
            false
        }
        _ = signal::ctrl_c() => true,
    };
    if !interrupted {
        signal::ctrl_c().await?;
    }

    info!("🛑 Shutdown signal received, stopping tasks...");
    trigger.trigger();
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!("❌ Task ended abnormally: {}", e);
        }
    }

    let persisted = store.persist_all().await;
    info!("💾 Persisted {} snapshots, bye", persisted);
    Ok(())
}
