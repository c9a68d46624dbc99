// Tests for the best-effort sqlite store

use std::time::Duration;

use solgraph_core::store::Database;
use tempfile::tempdir;

#[test]
fn database_creation_and_session_lifecycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("solgraph.db");

    assert!(!Database::exists(&path));
    let db = Database::new(&path).unwrap();
    assert!(Database::exists(&path));

    let session = db.create_session("seed-signature").unwrap();
    assert_eq!(db.session_status(&session).unwrap().unwrap(), "running");

    db.complete_session(&session).unwrap();
    assert_eq!(db.session_status(&session).unwrap().unwrap(), "completed");

    let failed = db.create_session("other-seed").unwrap();
    db.fail_session(&failed).unwrap();
    assert_eq!(db.session_status(&failed).unwrap().unwrap(), "failed");

    assert!(db.session_status("no-such-session").unwrap().is_none());
}

#[test]
fn path_results_round_trip() {
    let db = Database::in_memory().unwrap();

    db.save_path_result("walletA", "walletB", r#"["walletA","sig1","walletB"]"#)
        .unwrap();

    let (hops, timestamp) = db.load_path_result("walletA", "walletB").unwrap().unwrap();
    assert!(hops.contains("sig1"));
    assert!(timestamp > 0);

    // Keys are directional.
    assert!(db.load_path_result("walletB", "walletA").unwrap().is_none());

    // Overwrites replace the row rather than duplicating it.
    db.save_path_result("walletA", "walletB", r#"["walletA","walletB"]"#)
        .unwrap();
    let (hops, _) = db.load_path_result("walletA", "walletB").unwrap().unwrap();
    assert!(!hops.contains("sig1"));
}

#[test]
fn stale_paths_are_evicted_by_ttl() {
    let db = Database::in_memory().unwrap();
    db.save_path_result("walletA", "walletB", "[]").unwrap();

    // Fresh rows survive a generous TTL.
    assert_eq!(db.evict_stale_paths(3600).unwrap(), 0);
    assert!(db.load_path_result("walletA", "walletB").unwrap().is_some());

    std::thread::sleep(Duration::from_millis(1200));
    assert_eq!(db.evict_stale_paths(0).unwrap(), 1);
    assert!(db.load_path_result("walletA", "walletB").unwrap().is_none());
}

#[test]
fn snapshots_round_trip_with_viewport() {
    let db = Database::in_memory().unwrap();

    db.save_snapshot("sig1", r#"{"nodes":[],"edges":[]}"#, 1.5, 10.0, -20.0)
        .unwrap();

    let row = db.load_snapshot("sig1").unwrap().unwrap();
    assert_eq!(row.zoom, 1.5);
    assert_eq!(row.pan_x, 10.0);
    assert_eq!(row.pan_y, -20.0);
    assert!(row.payload.contains("nodes"));

    assert!(db.load_snapshot("sig2").unwrap().is_none());

    assert_eq!(db.evict_stale_snapshots(3600).unwrap(), 0);
}
