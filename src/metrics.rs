// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {
    Count,
    Seconds,
}

// Stubs still evaluate their arguments so callers see no unused bindings.
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = (&$name, &$value);
        $(let _ = (&$label, &$label_value);)*
    }};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = &$name;
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = (&$name, &$value);
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = (&$name, &$value);
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {{
        let _ = (&$name, &$unit, &$desc);
    }};
    ($name:expr, $desc:expr) => {{
        let _ = (&$name, &$desc);
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {{
        let _ = (&$name, &$desc);
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {{
        let _ = (&$name, &$unit, &$desc);
    }};
    ($name:expr, $desc:expr) => {{
        let _ = (&$name, &$desc);
    }};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use std::time::Duration;

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_histogram!(
        "multicall_batch_size_bucket",
        "Number of calls sent in one aggregate round-trip."
    );
    describe_counter!(
        "multicall_batch_failures_total",
        Unit::Count,
        "Batches that failed as a whole (transport error or short response), labeled by chain."
    );
    describe_counter!(
        "multicall_call_decode_failures_total",
        Unit::Count,
        "Individual calls that reverted or could not be decoded, labeled by chain and method."
    );
    describe_histogram!(
        "strategy_pass_duration_seconds",
        Unit::Seconds,
        "Wall time of one aggregation pass for a chain."
    );
    describe_gauge!(
        "strategy_records",
        "Strategies in the current on-chain snapshot of a chain."
    );
    describe_counter!(
        "meta_refresh_total",
        Unit::Count,
        "Metadata refresh cycles, labeled by chain and outcome."
    );
    describe_gauge!(
        "meta_records",
        "Addresses indexed in the metadata region of a chain."
    );
}

pub fn record_multicall_batch_size(size: f64) {
    histogram!("multicall_batch_size_bucket", size);
}

pub fn increment_multicall_batch_failure(chain_id: u64) {
    counter!("multicall_batch_failures_total", 1, "chain" => chain_id.to_string());
}

pub fn increment_call_decode_failure(chain_id: u64, method: &str) {
    counter!(
        "multicall_call_decode_failures_total",
        1,
        "chain" => chain_id.to_string(),
        "method" => method.to_string()
    );
}

pub fn record_pass_duration(chain_id: u64, duration: Duration) {
    histogram!(
        "strategy_pass_duration_seconds",
        duration.as_secs_f64(),
        "chain" => chain_id.to_string()
    );
}

pub fn set_strategy_records(chain_id: u64, count: usize) {
    gauge!("strategy_records", count as f64, "chain" => chain_id.to_string());
}

pub fn increment_meta_refresh(chain_id: u64, outcome: &str) {
    counter!(
        "meta_refresh_total",
        1,
        "chain" => chain_id.to_string(),
        "outcome" => outcome.to_string()
    );
}

pub fn set_meta_records(chain_id: u64, count: usize) {
    gauge!("meta_records", count as f64, "chain" => chain_id.to_string());
}

/// Starts the Prometheus scrape endpoint on `bind` (e.g. `0.0.0.0:9090`).
#[cfg(feature = "observability")]
pub fn install_exporter(bind: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    use metrics_exporter_prometheus::PrometheusBuilder;

    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid metrics bind address: {}", bind))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    describe_metrics();
    log::info!("📊 Metrics exporter listening on {}", addr);
    Ok(())
}

#[cfg(not(feature = "observability"))]
pub fn install_exporter(bind: &str) -> anyhow::Result<()> {
    log::warn!(
        "Metrics requested on {} but the 'observability' feature is not enabled",
        bind
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_is_harmless() {
        describe_metrics();
        record_multicall_batch_size(50.0);
        increment_multicall_batch_failure(1);
        increment_call_decode_failure(1, "keepCRV");
        record_pass_duration(1, Duration::from_millis(120));
        set_strategy_records(1, 3);
        increment_meta_refresh(1, "ok");
        set_meta_records(1, 9);
    }

    #[cfg(not(feature = "observability"))]
    #[test]
    fn disabled_macros_still_evaluate_arguments() {
        let mut evaluated = 0;
        counter!("c", { evaluated += 1; 1 }, "chain" => { evaluated += 1; "1" });
        gauge!("g", { evaluated += 1; 2.0 });
        histogram!("h", { evaluated += 1; 0.5 }, "chain" => "1");
        describe_counter!("c", Unit::Count, { evaluated += 1; "desc" });
        assert_eq!(evaluated, 5);
    }
}
