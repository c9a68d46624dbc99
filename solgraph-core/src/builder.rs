use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use solgraph_rpc::types::{is_valid_address, is_valid_signature};
use solgraph_rpc::{EndpointPool, LedgerClient};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::cache::{
    GraphStateSnapshot, TransactionCache, Viewport, ViewportCache, WalletPath, WalletPathCache,
};
use crate::config::ExplorerConfig;
use crate::error::{ExplorerError, Result};
use crate::events::{EventBus, ExplorerEvent, Severity};
use crate::filter::ExclusionFilter;
use crate::graph::{AccountStatus, EdgeKind, FlowGraph, GraphSnapshot};
use crate::scheduler::FetchScheduler;
use crate::store::Database;

/// What to expand around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    Transaction(String),
    Account(String),
}

impl Seed {
    /// Classify a base58 id by its decoded length.
    pub fn parse(input: &str) -> Result<Self> {
        if is_valid_signature(input) {
            Ok(Seed::Transaction(input.to_string()))
        } else if is_valid_address(input) {
            Ok(Seed::Account(input.to_string()))
        } else {
            Err(ExplorerError::InvalidSeed(input.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandSummary {
    pub nodes: usize,
    pub edges: usize,
    pub accounts_loaded: usize,
    pub accounts_discovered: usize,
}

/// Materializes fetched activity into the deduplicated graph and drives
/// further discovery up to the depth limit. Owns the graph; every mutation
/// funnels through here.
pub struct GraphBuilder {
    scheduler: FetchScheduler,
    graph: Mutex<FlowGraph>,
    filter: ExclusionFilter,
    tx_cache: Arc<TransactionCache>,
    path_cache: WalletPathCache,
    viewports: ViewportCache,
    events: EventBus,
    config: ExplorerConfig,
    pool: Arc<EndpointPool>,
    focused: Mutex<Option<String>>,
}

impl GraphBuilder {
    pub fn new(config: ExplorerConfig, store: Option<Arc<Database>>) -> Result<Self> {
        let pool = Arc::new(EndpointPool::new(config.pool.clone())?);
        let client = LedgerClient::new(pool.clone());
        let tx_cache = Arc::new(TransactionCache::new());
        let scheduler = FetchScheduler::new(client, tx_cache.clone(), config.clone());
        let filter = ExclusionFilter::with_addresses(config.extra_exclusions.iter().cloned());

        Ok(Self {
            scheduler,
            graph: Mutex::new(FlowGraph::new()),
            filter,
            tx_cache,
            path_cache: WalletPathCache::new(store.clone()),
            viewports: ViewportCache::new(store),
            events: EventBus::new(),
            config,
            pool,
            focused: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ExplorerEvent> {
        self.events.subscribe()
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    /// Expand around a seed and drain the resulting frontier.
    pub async fn expand(&self, seed: &Seed) -> Result<ExpandSummary> {
        match seed {
            Seed::Transaction(signature) => {
                self.expand_transaction(signature).await?;
            }
            Seed::Account(address) => {
                self.scheduler.queue_account_fetch(address, 0, None);
                self.process_queue().await;
            }
        }
        Ok(self.summary())
    }

    /// Drain the fetch queue in bounded-concurrency batches.
    ///
    /// Single-flight: a call that finds a drain already running returns
    /// immediately and the running drain picks up whatever was enqueued.
    /// Batches of `batch_size` race independently under a per-item timeout,
    /// with a short delay between batches so upstreams are not saturated.
    /// One item's failure never fails the batch.
    pub async fn process_queue(&self) {
        if !self.scheduler.begin_processing() {
            return;
        }

        loop {
            let batch = self.scheduler.next_batch();
            if batch.is_empty() {
                break;
            }

            join_all(batch.into_iter().map(|item| async move {
                let address = item.address.clone();
                let work = self.add_account_to_graph(
                    &item.address,
                    item.depth,
                    item.parent_signature.as_deref(),
                );
                match tokio::time::timeout(self.config.item_timeout, work).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) if err.is_cancelled() => {
                        debug!("expansion of {address} superseded");
                        self.scheduler.release_pending(&address);
                    }
                    Ok(Err(err)) => {
                        warn!("expanding {address} failed: {err}");
                        self.events.emit(ExplorerEvent::Alert {
                            severity: Severity::Warning,
                            scope: address.clone(),
                            message: err.to_string(),
                        });
                    }
                    Err(_) => {
                        warn!("expanding {address} timed out");
                        self.scheduler.release_pending(&address);
                        self.events.emit(ExplorerEvent::Alert {
                            severity: Severity::Warning,
                            scope: address.clone(),
                            message: "fetch timed out".to_string(),
                        });
                    }
                }
            }))
            .await;

            tokio::time::sleep(self.config.batch_delay).await;
        }

        self.scheduler.end_processing();
    }

    /// Fetch one account's activity and materialize it into the graph.
    ///
    /// Returns whether anything new was added. The account is marked loaded
    /// and progress advances whether or not data came back, so a
    /// visited-but-empty account still yields a visible node.
    pub async fn add_account_to_graph(
        &self,
        address: &str,
        depth: u32,
        parent_signature: Option<&str>,
    ) -> Result<bool> {
        if depth >= self.config.max_depth {
            debug!("{address} is past the depth limit ({depth})");
            self.scheduler.release_pending(address);
            return Ok(false);
        }
        if self.scheduler.is_loaded(address) {
            return Ok(false);
        }
        if self.filter.is_excluded(address) {
            debug!("{address} is excluded, skipping");
            self.scheduler.release_pending(address);
            return Ok(false);
        }

        let activity = self.scheduler.resolve_account(address).await?;

        self.scheduler.mark_loaded(address);

        let mut added = false;
        let mut discovered: Vec<(String, String)> = Vec::new();
        {
            let mut graph = self.graph.lock().unwrap();
            if graph.insert_account(address, AccountStatus::Pending) {
                added = true;
                self.events.emit(ExplorerEvent::AccountAdded {
                    address: address.to_string(),
                    depth,
                });
            }
            graph.mark_loaded(address, activity.transactions.len());

            if let Some(parent) = parent_signature
                && graph.contains(parent)
            {
                graph.insert_edge(parent, address, EdgeKind::TransactionToAccount);
            }

            for record in &activity.transactions {
                if graph.contains(&record.signature) {
                    continue;
                }
                if self.filter.excludes_transaction(&record.participants) {
                    debug!("dropping {} (excluded program traffic)", record.signature);
                    continue;
                }

                graph.insert_transaction(&record.signature, record.success, record.block_time);
                added = true;
                self.events.emit(ExplorerEvent::TransactionAdded {
                    signature: record.signature.clone(),
                });

                if graph.insert_edge(address, &record.signature, EdgeKind::AccountToTransaction) {
                    self.events.emit(ExplorerEvent::EdgeAdded {
                        source: address.to_string(),
                        target: record.signature.clone(),
                        transfer: false,
                    });
                }

                for participant in &record.participants {
                    if participant == address || self.filter.is_excluded(participant) {
                        continue;
                    }
                    if graph.insert_account(participant, AccountStatus::Pending) {
                        added = true;
                        self.events.emit(ExplorerEvent::AccountAdded {
                            address: participant.clone(),
                            depth: depth + 1,
                        });
                    }
                    if graph.insert_edge(
                        &record.signature,
                        participant,
                        EdgeKind::TransactionToAccount,
                    ) {
                        self.events.emit(ExplorerEvent::EdgeAdded {
                            source: record.signature.clone(),
                            target: participant.clone(),
                            transfer: false,
                        });
                    }
                    discovered.push((participant.clone(), record.signature.clone()));
                }

                for transfer in &record.transfers {
                    if self.filter.is_excluded(&transfer.account) {
                        continue;
                    }
                    graph.insert_account(&transfer.account, AccountStatus::Pending);
                    if graph.insert_edge(
                        &record.signature,
                        &transfer.account,
                        EdgeKind::Transfer {
                            amount: transfer.amount,
                        },
                    ) {
                        self.events.emit(ExplorerEvent::EdgeAdded {
                            source: record.signature.clone(),
                            target: transfer.account.clone(),
                            transfer: true,
                        });
                    }
                }
            }
        }

        self.emit_progress();

        // Re-queue the frontier one hop deeper, but only while the next hop
        // still has room to be expanded itself.
        if depth + 1 < self.config.max_depth {
            let mut seen = HashSet::new();
            for (account, via_signature) in discovered {
                if seen.insert(account.clone()) {
                    self.scheduler
                        .queue_account_fetch(&account, depth + 1, Some(&via_signature));
                }
            }
        }

        Ok(added)
    }

    /// Expand around a focused transaction. Queues every participant at
    /// depth 1, lets the queue settle briefly, processes the accounts
    /// connected to the transaction node, and preserves the focused viewport
    /// across the expansion. Returns whether new elements were added, so the
    /// caller can decide whether a re-render is warranted.
    pub async fn expand_transaction(&self, signature: &str) -> Result<bool> {
        if !is_valid_signature(signature) {
            return Err(ExplorerError::InvalidSeed(signature.to_string()));
        }

        let (nodes_before, edges_before) = {
            let graph = self.graph.lock().unwrap();
            (graph.node_count(), graph.edge_count())
        };
        let saved_viewport = self.viewports.viewport_for(signature);

        let detail = self.scheduler.detail_cached(signature).await;
        let (success, block_time, participants) = match &detail {
            Some(detail) => (
                detail.success,
                detail.block_time,
                detail
                    .account_keys
                    .iter()
                    .filter(|key| !self.filter.is_excluded(key))
                    .cloned()
                    .collect::<Vec<_>>(),
            ),
            // No data is still a visible node.
            None => (true, None, Vec::new()),
        };

        {
            let mut graph = self.graph.lock().unwrap();
            graph.insert_transaction(signature, success, block_time);
            for participant in &participants {
                graph.insert_account(participant, AccountStatus::Pending);
                graph.insert_edge(signature, participant, EdgeKind::TransactionToAccount);
            }
        }

        for participant in &participants {
            self.scheduler
                .queue_account_fetch(participant, 1, Some(signature));
        }

        // Give discovery a moment to settle before enumerating connections.
        tokio::time::sleep(self.config.propagation_delay).await;

        let connected = {
            let graph = self.graph.lock().unwrap();
            graph.accounts_connected_to(signature)
        };
        for account in &connected {
            self.scheduler.queue_account_fetch(account, 1, Some(signature));
        }

        self.process_queue().await;

        let (nodes_after, edges_after) = {
            let graph = self.graph.lock().unwrap();
            (graph.node_count(), graph.edge_count())
        };
        let added = nodes_after > nodes_before || edges_after > edges_before;

        if added {
            // Replayable state for the consumer, with the pre-expansion
            // viewport intact.
            let snapshot = self.graph.lock().unwrap().snapshot();
            self.viewports.save(signature, snapshot, saved_viewport);
        }

        let (loaded, _) = self.scheduler.counts();
        self.events.emit(ExplorerEvent::AccountsExpanded { count: loaded });
        info!(
            "expansion of {signature} added {} nodes, {} edges",
            nodes_after - nodes_before,
            edges_after - edges_before
        );

        Ok(added)
    }

    /// Re-focus on a transaction. Supersedes in-flight work tied to the
    /// previous focus and hands back any replayable snapshot.
    pub fn focus(&self, signature: &str) -> Option<GraphStateSnapshot> {
        self.scheduler.supersede();
        *self.focused.lock().unwrap() = Some(signature.to_string());
        self.viewports.get(signature)
    }

    /// The consumer pushes its current pan/zoom here so later expansions can
    /// restore it.
    pub fn set_viewport(&self, signature: &str, viewport: Viewport) {
        self.viewports.set_viewport(signature, viewport);
    }

    pub fn focused(&self) -> Option<String> {
        self.focused.lock().unwrap().clone()
    }

    /// Abort the current traversal. In-flight fetches resolve as superseded,
    /// not failed.
    pub fn stop_tracking(&self) {
        self.scheduler.supersede();
        *self.focused.lock().unwrap() = None;
        debug!("tracking stopped");
    }

    /// Shortest known chain between two wallets, cached two-tier.
    pub fn find_path(&self, source: &str, target: &str) -> Option<WalletPath> {
        if let Some(hit) = self.path_cache.get(source, target) {
            return Some(hit);
        }

        let hops = self.graph.lock().unwrap().find_path(source, target)?;
        let path = WalletPath {
            source: source.to_string(),
            target: target.to_string(),
            hops,
        };
        self.path_cache.insert(path.clone());
        Some(path)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.lock().unwrap().snapshot()
    }

    pub fn node_count(&self) -> usize {
        self.graph.lock().unwrap().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.lock().unwrap().edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.graph.lock().unwrap().contains(id)
    }

    /// Run `f` against the graph under its lock.
    pub fn with_graph<R>(&self, f: impl FnOnce(&FlowGraph) -> R) -> R {
        f(&self.graph.lock().unwrap())
    }

    pub fn summary(&self) -> ExpandSummary {
        let (loaded, discovered) = self.scheduler.counts();
        let graph = self.graph.lock().unwrap();
        ExpandSummary {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            accounts_loaded: loaded,
            accounts_discovered: discovered,
        }
    }

    pub fn transaction_cache_len(&self) -> usize {
        self.tx_cache.len()
    }

    /// Tear the session down: supersede in-flight work and close the pool.
    pub fn close(&self) {
        self.scheduler.supersede();
        self.pool.close();
    }

    fn emit_progress(&self) {
        let (loaded, discovered) = self.scheduler.counts();
        let percent = ((loaded as f64 / discovered.max(1) as f64) * 100.0).round() as u8;
        self.events.emit(ExplorerEvent::Progress {
            percent: percent.min(100),
            loaded,
            discovered,
        });
    }
}
