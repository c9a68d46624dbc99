// Tests for the expansion caches

use std::sync::Arc;
use std::time::Duration;

use solgraph_core::cache::{
    TransactionCache, Viewport, ViewportCache, WalletPath, WalletPathCache,
};
use solgraph_core::graph::GraphSnapshot;
use solgraph_core::store::Database;
use solgraph_rpc::types::TransactionDetail;

fn path(source: &str, target: &str) -> WalletPath {
    WalletPath {
        source: source.to_string(),
        target: target.to_string(),
        hops: vec![source.to_string(), target.to_string()],
    }
}

#[test]
fn transaction_cache_round_trips() {
    let cache = TransactionCache::new();
    assert!(cache.get("sig1").is_none());

    cache.insert(TransactionDetail {
        signature: "sig1".to_string(),
        success: true,
        block_time: Some(1_700_000_000),
        account_keys: vec!["walletA".to_string()],
        balance_changes: vec![],
    });

    let hit = cache.get("sig1").unwrap();
    assert_eq!(hit.account_keys, vec!["walletA"]);
    assert_eq!(cache.len(), 1);
}

#[test]
fn path_cache_serves_fresh_entries() {
    let cache = WalletPathCache::with_limits(None, Duration::from_secs(60), 10);
    assert!(cache.get("walletA", "walletB").is_none());

    cache.insert(path("walletA", "walletB"));
    let hit = cache.get("walletA", "walletB").unwrap();
    assert_eq!(hit.hops.len(), 2);

    // Directional keys.
    assert!(cache.get("walletB", "walletA").is_none());
}

#[test]
fn path_cache_expires_by_ttl() {
    let cache = WalletPathCache::with_limits(None, Duration::from_millis(30), 10);
    cache.insert(path("walletA", "walletB"));

    std::thread::sleep(Duration::from_millis(60));
    assert!(cache.get("walletA", "walletB").is_none());
    assert!(cache.is_empty());
}

#[test]
fn path_cache_evicts_oldest_beyond_capacity() {
    let cache = WalletPathCache::with_limits(None, Duration::from_secs(60), 2);
    cache.insert(path("a", "b"));
    std::thread::sleep(Duration::from_millis(5));
    cache.insert(path("c", "d"));
    std::thread::sleep(Duration::from_millis(5));
    cache.insert(path("e", "f"));

    assert_eq!(cache.len(), 2);
    // The first insert was the oldest and should be gone.
    assert!(cache.get("a", "b").is_none());
    assert!(cache.get("c", "d").is_some());
    assert!(cache.get("e", "f").is_some());
}

#[test]
fn path_cache_falls_back_to_the_store_tier() {
    let store = Arc::new(Database::in_memory().unwrap());

    let writer = WalletPathCache::with_limits(Some(store.clone()), Duration::from_secs(60), 10);
    writer.insert(path("walletA", "walletB"));

    // A fresh cache over the same store misses memory and promotes the
    // persisted row.
    let reader = WalletPathCache::with_limits(Some(store), Duration::from_secs(60), 10);
    let hit = reader.get("walletA", "walletB").unwrap();
    assert_eq!(hit.hops, vec!["walletA", "walletB"]);
    assert_eq!(reader.len(), 1);
}

#[test]
fn viewport_cache_preserves_pan_and_zoom() {
    let cache = ViewportCache::new(None);
    assert_eq!(cache.viewport_for("sig1"), Viewport::default());

    let viewport = Viewport {
        zoom: 2.0,
        pan_x: 100.0,
        pan_y: -50.0,
    };
    cache.save("sig1", GraphSnapshot::default(), viewport);
    assert_eq!(cache.viewport_for("sig1"), viewport);

    let updated = Viewport {
        zoom: 0.5,
        ..viewport
    };
    cache.set_viewport("sig1", updated);
    assert_eq!(cache.viewport_for("sig1"), updated);
}

#[test]
fn viewport_cache_reads_through_the_store() {
    let store = Arc::new(Database::in_memory().unwrap());
    let viewport = Viewport {
        zoom: 3.0,
        pan_x: 1.0,
        pan_y: 2.0,
    };

    let writer = ViewportCache::new(Some(store.clone()));
    writer.save("sig1", GraphSnapshot::default(), viewport);

    let reader = ViewportCache::new(Some(store));
    let state = reader.get("sig1").unwrap();
    assert_eq!(state.viewport, viewport);
    assert!(state.snapshot.nodes.is_empty());
}
