//! Integration tests for metadata ingestion
//!
//! Tests cover:
//! - Address indexing of a fetched meta document
//! - Merge without eviction across refreshes
//! - Isolation from the on-chain region of the store
//! - Start-up readiness of the refresh loop against a local HTTP server
//!
//! Note: live HTTP fetches are excluded

use ethers::types::Address;
use std::str::FromStr;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strategy_state_sdk::kv_store::MemoryKvStore;
use strategy_state_sdk::meta_refresher::{meta_url, parse_document, MetaError, MetaStrategiesRefresher};
use strategy_state_sdk::scheduler::{shutdown_channel, StartupBarrier};
use strategy_state_sdk::{AggregationStore, StrategyMulticallData};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const DOCUMENT: &[u8] = br#"[
    {
        "name": "StrategyCurve3CrvVoterProxy",
        "description": "Supplies 3CRV to Curve and farms CRV",
        "addresses": [
            "0x1676055fE954EE6fc388F9096210E5EbE0A9070c",
            "0xC59601F0CC49baa266891b7fc63d2D5FE097A79D"
        ],
        "protocols": ["Curve", "Convex"]
    },
    {
        "name": "GenLevCompV3",
        "description": "Leveraged Compound lending",
        "addresses": ["0x4031afd3B0F71Bace9181E554A9E680Ee4AbE7dF", "bogus"]
    }
]"#;

fn store() -> Arc<AggregationStore> {
    Arc::new(AggregationStore::new(Arc::new(MemoryKvStore::new())))
}

#[test]
fn test_document_is_indexed_by_every_address() {
    let store = store();
    let records = parse_document(DOCUMENT).unwrap();
    assert_eq!(store.merge_meta(1, records), 3);

    let curve = store.get_meta_by_str(1, "0xc59601f0cc49baa266891b7fc63d2d5fe097a79d").unwrap();
    assert_eq!(curve.name, "StrategyCurve3CrvVoterProxy");
    assert_eq!(curve.protocols, vec!["Curve".to_string(), "Convex".to_string()]);

    let lev = Address::from_str("0x4031afd3B0F71Bace9181E554A9E680Ee4AbE7dF").unwrap();
    assert_eq!(store.get_meta(1, &lev).unwrap().name, "GenLevCompV3");
    assert_eq!(store.meta_len(1), 3);
}

#[test]
fn test_refresh_merges_without_eviction() {
    let store = store();
    store.merge_meta(1, parse_document(DOCUMENT).unwrap());

    let update = br#"[{ "name": "StrategyCurve3CrvVoterProxy v2",
                       "addresses": ["0x1676055fE954EE6fc388F9096210E5EbE0A9070c"] }]"#;
    store.merge_meta(1, parse_document(update).unwrap());

    assert_eq!(
        store.get_meta_by_str(1, "0x1676055fE954EE6fc388F9096210E5EbE0A9070c").unwrap().name,
        "StrategyCurve3CrvVoterProxy v2"
    );
    assert_eq!(store.meta_len(1), 3, "entries absent from the new document are kept");
}

#[test]
fn test_meta_and_onchain_regions_are_disjoint() {
    let store = store();
    let strategy = Address::from_str("0x1676055fE954EE6fc388F9096210E5EbE0A9070c").unwrap();
    store.replace_network_snapshot(1, [(strategy, StrategyMulticallData::default())].into_iter().collect());
    store.merge_meta(1, parse_document(DOCUMENT).unwrap());

    assert!(store.get(1, &strategy).is_some());
    assert!(store.get_meta(1, &strategy).is_some());
    assert!(store.get_meta(10, &strategy).is_none());
    assert!(store.meta_refreshed_at(1).is_some());
}

#[test]
fn test_truncated_document_is_rejected() {
    let err = parse_document(&DOCUMENT[..40]).unwrap_err();
    assert!(matches!(err, MetaError::Parse(_)));
}

#[test]
fn test_refresher_targets_chain_url() {
    let refresher = MetaStrategiesRefresher::new(
        42161,
        "https://meta.yearn.network/api/",
        store(),
        Duration::from_secs(5),
    )
    .unwrap();
    assert_eq!(
        refresher.url(),
        &meta_url("https://meta.yearn.network/api/", 42161).unwrap()
    );
    assert!(refresher.url().as_str().ends_with("/42161/strategies/all"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_fetch_error() {
    // nothing listens on the discard port
    let refresher = MetaStrategiesRefresher::new(1, "http://127.0.0.1:9/", store(), Duration::from_millis(500)).unwrap();
    let err = refresher.refresh_once().await.unwrap_err();
    assert!(matches!(err, MetaError::Fetch(_)));
}

/// Serves a 500 on the first request and `DOCUMENT` afterwards.
/// Returns the bound address and the request counter.
async fn flaky_meta_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
            } else {
                let mut ok = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    DOCUMENT.len()
                )
                .into_bytes();
                ok.extend_from_slice(DOCUMENT);
                ok
            };
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        }
    });
    (addr, hits)
}

#[tokio::test]
async fn test_run_signals_ready_after_first_successful_refresh() {
    let (addr, hits) = flaky_meta_server().await;
    let store = store();
    let refresher = MetaStrategiesRefresher::new(1, &format!("http://{}/", addr), store.clone(), Duration::from_secs(5))
        .unwrap()
        .with_refresh_interval(Duration::from_millis(50));

    let mut barrier = StartupBarrier::new();
    let ready = barrier.register("meta:1");
    let (trigger, shutdown) = shutdown_channel();
    let handle = tokio::spawn(Arc::new(refresher).run(ready, shutdown));

    let released = tokio::time::timeout(Duration::from_secs(5), barrier.wait()).await.unwrap();
    assert_eq!(released, 1);
    // the 500 did not count, the barrier waited for the next answer
    let hits_at_ready = hits.load(Ordering::SeqCst);
    assert!(hits_at_ready >= 2, "released after {hits_at_ready} requests");
    assert_eq!(store.meta_len(1), 3);

    // the loop keeps refreshing once ready
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(hits.load(Ordering::SeqCst) > hits_at_ready);

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
