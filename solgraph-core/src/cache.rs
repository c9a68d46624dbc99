use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use solgraph_rpc::types::TransactionDetail;
use tracing::{debug, warn};

use crate::graph::GraphSnapshot;
use crate::store::Database;

pub const PATH_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const PATH_CACHE_CAPACITY: usize = 1000;

/// Pan/zoom state the consumer wants preserved across redraws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Signature → decoded detail. Checked before every detail fetch; unbounded
/// within a session, which is acceptable given process lifetime scope.
#[derive(Default)]
pub struct TransactionCache {
    entries: Mutex<HashMap<String, TransactionDetail>>,
}

impl TransactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &str) -> Option<TransactionDetail> {
        self.entries.lock().unwrap().get(signature).cloned()
    }

    pub fn insert(&self, detail: TransactionDetail) {
        self.entries
            .lock()
            .unwrap()
            .insert(detail.signature.clone(), detail);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A resolved wallet-to-wallet path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletPath {
    pub source: String,
    pub target: String,
    pub hops: Vec<String>,
}

struct PathEntry {
    path: WalletPath,
    stored_at: Instant,
}

/// Two-tier `(source, target)` → path cache: a fast in-memory map in front
/// of the sqlite store. Entries expire after `ttl` and the memory tier holds
/// at most `capacity` entries, evicting oldest-by-timestamp beyond that.
pub struct WalletPathCache {
    entries: Mutex<HashMap<(String, String), PathEntry>>,
    store: Option<Arc<Database>>,
    ttl: Duration,
    capacity: usize,
}

impl WalletPathCache {
    pub fn new(store: Option<Arc<Database>>) -> Self {
        Self::with_limits(store, PATH_CACHE_TTL, PATH_CACHE_CAPACITY)
    }

    pub fn with_limits(store: Option<Arc<Database>>, ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            store,
            ttl,
            capacity,
        }
    }

    pub fn get(&self, source: &str, target: &str) -> Option<WalletPath> {
        let key = (source.to_string(), target.to_string());
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get(&key) {
                if entry.stored_at.elapsed() < self.ttl {
                    return Some(entry.path.clone());
                }
                entries.remove(&key);
            }
        }

        // Fall through to the persistent tier and promote fresh hits.
        let store = self.store.as_ref()?;
        match store.load_path_result(source, target) {
            Ok(Some((hops_json, timestamp))) => {
                let age = now_unix().saturating_sub(timestamp);
                if age > self.ttl.as_secs() as i64 {
                    return None;
                }
                let hops: Vec<String> = serde_json::from_str(&hops_json).ok()?;
                let path = WalletPath {
                    source: source.to_string(),
                    target: target.to_string(),
                    hops,
                };
                self.insert_memory(path.clone());
                Some(path)
            }
            Ok(None) => None,
            Err(err) => {
                debug!("path store lookup failed: {err}");
                None
            }
        }
    }

    pub fn insert(&self, path: WalletPath) {
        if let Some(store) = &self.store {
            match serde_json::to_string(&path.hops) {
                Ok(hops_json) => {
                    if let Err(err) =
                        store.save_path_result(&path.source, &path.target, &hops_json)
                    {
                        warn!("failed to persist path result: {err}");
                    }
                }
                Err(err) => warn!("failed to encode path result: {err}"),
            }
        }
        self.insert_memory(path);
    }

    fn insert_memory(&self, path: WalletPath) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            (path.source.clone(), path.target.clone()),
            PathEntry {
                path,
                stored_at: Instant::now(),
            },
        );
        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => entries.remove(&key),
                None => break,
            };
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A focused transaction's graph state plus the viewport it was seen under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStateSnapshot {
    pub snapshot: GraphSnapshot,
    pub viewport: Viewport,
    pub stored_at_unix: i64,
}

/// Focused-signature → graph/viewport snapshot, so an expansion can be
/// replayed without re-fetching everything. Backed by the store when one is
/// attached.
pub struct ViewportCache {
    entries: Mutex<HashMap<String, GraphStateSnapshot>>,
    store: Option<Arc<Database>>,
}

impl ViewportCache {
    pub fn new(store: Option<Arc<Database>>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn get(&self, signature: &str) -> Option<GraphStateSnapshot> {
        if let Some(state) = self.entries.lock().unwrap().get(signature) {
            return Some(state.clone());
        }

        let store = self.store.as_ref()?;
        match store.load_snapshot(signature) {
            Ok(Some(row)) => {
                let snapshot: GraphSnapshot = serde_json::from_str(&row.payload).ok()?;
                Some(GraphStateSnapshot {
                    snapshot,
                    viewport: Viewport {
                        zoom: row.zoom,
                        pan_x: row.pan_x,
                        pan_y: row.pan_y,
                    },
                    stored_at_unix: row.timestamp,
                })
            }
            Ok(None) => None,
            Err(err) => {
                debug!("snapshot store lookup failed: {err}");
                None
            }
        }
    }

    /// The viewport last seen for a signature, defaulting when unknown.
    pub fn viewport_for(&self, signature: &str) -> Viewport {
        self.get(signature)
            .map(|state| state.viewport)
            .unwrap_or_default()
    }

    pub fn save(&self, signature: &str, snapshot: GraphSnapshot, viewport: Viewport) {
        if let Some(store) = &self.store {
            match serde_json::to_string(&snapshot) {
                Ok(payload) => {
                    if let Err(err) = store.save_snapshot(
                        signature,
                        &payload,
                        viewport.zoom,
                        viewport.pan_x,
                        viewport.pan_y,
                    ) {
                        warn!("failed to persist snapshot for {signature}: {err}");
                    }
                }
                Err(err) => warn!("failed to encode snapshot for {signature}: {err}"),
            }
        }

        self.entries.lock().unwrap().insert(
            signature.to_string(),
            GraphStateSnapshot {
                snapshot,
                viewport,
                stored_at_unix: now_unix(),
            },
        );
    }

    pub fn set_viewport(&self, signature: &str, viewport: Viewport) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(state) = entries.get_mut(signature) {
            state.viewport = viewport;
        } else {
            entries.insert(
                signature.to_string(),
                GraphStateSnapshot {
                    snapshot: GraphSnapshot::default(),
                    viewport,
                    stored_at_unix: now_unix(),
                },
            );
        }
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
