// Tests for the fetch scheduler: queue discipline, circuit breaking and
// two-tier resolution against a mock upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use solgraph_core::cache::TransactionCache;
use solgraph_core::config::ExplorerConfig;
use solgraph_core::scheduler::{FetchScheduler, QueueOutcome};
use solgraph_rpc::{BackoffConfig, EndpointPool, LedgerClient};
use url::Url;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn test_address(seed: u8) -> String {
    bs58::encode([seed; 32]).into_string()
}

fn test_signature(seed: u8) -> String {
    bs58::encode([seed; 64]).into_string()
}

/// Matches JSON-RPC requests by method name and, optionally, by a substring
/// of the params (an address or signature).
struct RpcMatch {
    method: &'static str,
    contains: Option<String>,
}

impl wiremock::Match for RpcMatch {
    fn matches(&self, request: &Request) -> bool {
        let body = String::from_utf8_lossy(&request.body);
        body.contains(self.method)
            && self
                .contains
                .as_ref()
                .is_none_or(|needle| body.contains(needle.as_str()))
    }
}

fn rpc_method(method: &'static str) -> RpcMatch {
    RpcMatch {
        method,
        contains: None,
    }
}

fn rpc_method_for(method: &'static str, needle: &str) -> RpcMatch {
    RpcMatch {
        method,
        contains: Some(needle.to_string()),
    }
}

fn rpc_ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

fn quick_config(endpoint: &str) -> ExplorerConfig {
    let mut config = ExplorerConfig::new(vec![Url::parse(endpoint).unwrap()]);
    config.pool.max_retries = 0;
    config.pool.backoff = BackoffConfig {
        max_retries: 0,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        jitter: Duration::ZERO,
    };
    config.batch_delay = Duration::from_millis(1);
    config.propagation_delay = Duration::from_millis(10);
    config
}

fn scheduler_for(config: ExplorerConfig) -> FetchScheduler {
    let pool = Arc::new(EndpointPool::new(config.pool.clone()).unwrap());
    FetchScheduler::new(
        LedgerClient::new(pool),
        Arc::new(TransactionCache::new()),
        config,
    )
}

#[tokio::test]
async fn queueing_deduplicates_and_validates() {
    let scheduler = scheduler_for(quick_config("http://127.0.0.1:1"));
    let wallet = test_address(1);

    assert_eq!(
        scheduler.queue_account_fetch(&wallet, 0, None),
        QueueOutcome::Queued
    );
    assert_eq!(
        scheduler.queue_account_fetch(&wallet, 0, None),
        QueueOutcome::AlreadyPending
    );

    scheduler.mark_loaded(&wallet);
    assert_eq!(
        scheduler.queue_account_fetch(&wallet, 1, None),
        QueueOutcome::AlreadyLoaded
    );

    assert_eq!(
        scheduler.queue_account_fetch("", 0, None),
        QueueOutcome::Invalid
    );
    assert_eq!(
        scheduler.queue_account_fetch("not-base58-0OIl", 0, None),
        QueueOutcome::Invalid
    );
}

#[tokio::test]
async fn queue_drops_discoveries_beyond_capacity() {
    let config = quick_config("http://127.0.0.1:1").with_queue_capacity(3);
    let scheduler = scheduler_for(config);

    let mut queued = 0;
    let mut dropped = 0;
    for seed in 1..=5u8 {
        match scheduler.queue_account_fetch(&test_address(seed), 0, None) {
            QueueOutcome::Queued => queued += 1,
            QueueOutcome::Dropped => dropped += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(queued, 3);
    assert_eq!(dropped, 2);
    assert_eq!(scheduler.queue_len(), 3);
}

#[tokio::test]
async fn single_flight_gate_admits_one_drain() {
    let scheduler = scheduler_for(quick_config("http://127.0.0.1:1"));
    assert!(scheduler.begin_processing());
    assert!(!scheduler.begin_processing());
    scheduler.end_processing();
    assert!(scheduler.begin_processing());
}

#[tokio::test]
async fn deny_listed_address_never_touches_the_network() {
    let server = MockServer::start().await;
    let scheduler = scheduler_for(quick_config(&server.uri()));

    // Wrapped SOL is on the static deny list.
    let activity = scheduler
        .resolve_account("So11111111111111111111111111111111111111112")
        .await
        .unwrap();

    assert!(activity.transactions.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn resolution_never_returns_absent_data() {
    let server = MockServer::start().await;
    Mock::given(rpc_method("getTokenTransfers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(rpc_method("getSignaturesForAddress"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let scheduler = scheduler_for(quick_config(&server.uri()));
    let wallet = test_address(7);

    // Both tiers fail; the result is still a valid empty structure.
    let activity = scheduler.resolve_account(&wallet).await.unwrap();
    assert_eq!(activity.address, wallet);
    assert!(activity.transactions.is_empty());
}

#[tokio::test]
async fn empty_transfers_fall_back_to_signature_history() {
    let server = MockServer::start().await;
    let wallet = test_address(2);
    let other = test_address(3);
    let signature = test_signature(9);

    Mock::given(rpc_method("getTokenTransfers"))
        .respond_with(rpc_ok(json!([])))
        .mount(&server)
        .await;
    Mock::given(rpc_method("getSignaturesForAddress"))
        .respond_with(rpc_ok(json!([
            { "signature": signature.clone(), "slot": 1, "err": null, "blockTime": 1_700_000_000 },
        ])))
        .mount(&server)
        .await;
    Mock::given(rpc_method("getTransaction"))
        .respond_with(rpc_ok(json!({
            "blockTime": 1_700_000_000,
            "meta": { "err": null, "preBalances": [100, 0], "postBalances": [60, 40] },
            "transaction": { "message": { "accountKeys": [wallet.clone(), other.clone()] } },
        })))
        .mount(&server)
        .await;

    let scheduler = scheduler_for(quick_config(&server.uri()));
    let activity = scheduler.resolve_account(&wallet).await.unwrap();

    assert_eq!(activity.transactions.len(), 1);
    let record = &activity.transactions[0];
    assert_eq!(record.signature, signature);
    assert_eq!(record.participants.len(), 2);
    assert_eq!(record.transfers.len(), 2);
}

#[tokio::test]
async fn transfer_tier_wins_when_it_has_rows() {
    let server = MockServer::start().await;
    let wallet = test_address(4);
    let counterparty = test_address(5);
    let signature = test_signature(10);

    Mock::given(rpc_method("getTokenTransfers"))
        .respond_with(rpc_ok(json!([
            {
                "signature": signature.clone(),
                "source": wallet.clone(),
                "destination": counterparty.clone(),
                "amount": 1_000,
                "blockTime": 1_700_000_000,
            },
        ])))
        .mount(&server)
        .await;
    // The fallback tier must not be consulted.
    Mock::given(rpc_method("getSignaturesForAddress"))
        .respond_with(rpc_ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let scheduler = scheduler_for(quick_config(&server.uri()));
    let activity = scheduler.resolve_account(&wallet).await.unwrap();

    assert_eq!(activity.transactions.len(), 1);
    let record = &activity.transactions[0];
    assert!(record.participants.contains(&counterparty));
    assert_eq!(record.transfers[0].amount, 1_000);
}

#[tokio::test]
async fn supersession_cancels_in_flight_resolution() {
    let server = MockServer::start().await;
    let wallet = test_address(6);

    Mock::given(rpc_method("getTokenTransfers"))
        .respond_with(rpc_ok(json!([])).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let scheduler = scheduler_for(quick_config(&server.uri()));

    let (result, _) = tokio::join!(scheduler.resolve_account(&wallet), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.supersede();
    });

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn cached_details_skip_the_network() {
    let server = MockServer::start().await;
    let signature = test_signature(11);

    Mock::given(rpc_method_for("getTransaction", &signature))
        .respond_with(rpc_ok(json!({
            "meta": { "err": null, "preBalances": [], "postBalances": [] },
            "transaction": { "message": { "accountKeys": [test_address(1)] } },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scheduler = scheduler_for(quick_config(&server.uri()));

    assert!(scheduler.detail_cached(&signature).await.is_some());
    // Second lookup is served from the session cache.
    assert!(scheduler.detail_cached(&signature).await.is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
