use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use solgraph_rpc::error::Result as RpcResult;
use solgraph_rpc::types::{
    AccountActivity, TransactionDetail, TransactionRecord, TransferRecord, is_valid_address,
};
use solgraph_rpc::rate_limit::with_backoff;
use solgraph_rpc::{LedgerClient, RpcError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::TransactionCache;
use crate::config::ExplorerConfig;
use crate::filter;

/// One unit of traversal work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub address: String,
    pub depth: u32,
    pub parent_signature: Option<String>,
}

/// What happened to an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Queued,
    AlreadyLoaded,
    AlreadyPending,
    /// The queue is at its hard cap; the discovery was dropped, not blocked.
    Dropped,
    Invalid,
}

struct SchedulerState {
    queue: VecDeque<QueueItem>,
    pending: HashSet<String>,
    loaded: HashSet<String>,
    total_discovered: usize,
    processing: bool,
}

/// Bounded traversal frontier with deduplication, a deny-list circuit
/// breaker and two-tier account resolution.
///
/// Shared sets are guarded by a plain mutex that is never held across a
/// suspension point: every check-then-mark runs inside a single lock
/// acquisition, which is the whole race-avoidance discipline here.
pub struct FetchScheduler {
    client: LedgerClient,
    config: ExplorerConfig,
    state: Mutex<SchedulerState>,
    tx_cache: Arc<TransactionCache>,
    generation: watch::Sender<u64>,
}

impl FetchScheduler {
    pub fn new(client: LedgerClient, tx_cache: Arc<TransactionCache>, config: ExplorerConfig) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            client,
            config,
            state: Mutex::new(SchedulerState {
                queue: VecDeque::new(),
                pending: HashSet::new(),
                loaded: HashSet::new(),
                total_discovered: 0,
                processing: false,
            }),
            tx_cache,
            generation,
        }
    }

    /// Add an account to the fetch frontier. The pending mark is taken
    /// synchronously, before any suspension point, so a duplicate discovery
    /// cannot slip in between check and mark.
    pub fn queue_account_fetch(
        &self,
        address: &str,
        depth: u32,
        parent_signature: Option<&str>,
    ) -> QueueOutcome {
        if !is_valid_address(address) {
            debug!("rejecting invalid address {address:?}");
            return QueueOutcome::Invalid;
        }

        let mut state = self.state.lock().unwrap();
        if state.loaded.contains(address) {
            return QueueOutcome::AlreadyLoaded;
        }
        if state.pending.contains(address) {
            return QueueOutcome::AlreadyPending;
        }
        if state.queue.len() >= self.config.queue_capacity {
            warn!(
                "fetch queue at capacity ({}), dropping {address}",
                self.config.queue_capacity
            );
            return QueueOutcome::Dropped;
        }

        state.pending.insert(address.to_string());
        state.queue.push_back(QueueItem {
            address: address.to_string(),
            depth,
            parent_signature: parent_signature.map(str::to_string),
        });
        state.total_discovered += 1;
        QueueOutcome::Queued
    }

    /// Single-flight gate around queue draining. Returns false when a drain
    /// is already running.
    pub fn begin_processing(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.processing {
            return false;
        }
        state.processing = true;
        true
    }

    pub fn end_processing(&self) {
        self.state.lock().unwrap().processing = false;
    }

    /// Take up to one batch off the queue.
    pub fn next_batch(&self) -> Vec<QueueItem> {
        let mut state = self.state.lock().unwrap();
        let take = self.config.batch_size.min(state.queue.len());
        state.queue.drain(..take).collect()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_loaded(&self, address: &str) -> bool {
        self.state.lock().unwrap().loaded.contains(address)
    }

    pub fn mark_loaded(&self, address: &str) {
        let mut state = self.state.lock().unwrap();
        state.pending.remove(address);
        state.loaded.insert(address.to_string());
    }

    /// Forget a pending mark without loading, so a superseded or timed-out
    /// account can be rediscovered later.
    pub fn release_pending(&self, address: &str) {
        self.state.lock().unwrap().pending.remove(address);
    }

    /// (loaded, total discovered) — the progress ratio inputs.
    pub fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.loaded.len(), state.total_discovered)
    }

    // Supersession. Bumping the generation aborts every in-flight fetch tied
    // to the previous focus; aborted work is Cancelled, not failure.

    pub fn supersede(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Race `future` against supersession of `generation`.
    pub async fn cancellable<T>(
        &self,
        generation: u64,
        future: impl Future<Output = RpcResult<T>>,
    ) -> RpcResult<T> {
        let mut watcher = self.generation.subscribe();
        tokio::select! {
            result = future => result,
            _ = watcher.wait_for(|current| *current != generation) => Err(RpcError::Cancelled),
        }
    }

    /// Resolve an account's recent activity.
    ///
    /// Never returns an absent value: deny-listed addresses short-circuit to
    /// an empty result without touching the network, and upstream failure of
    /// both tiers normalizes to an empty result too. The only error this
    /// surfaces is `Cancelled`.
    pub async fn resolve_account(&self, address: &str) -> RpcResult<AccountActivity> {
        if filter::is_deny_listed(address) {
            debug!("{address} is deny-listed, skipping fetch");
            return Ok(AccountActivity::empty(address));
        }

        let generation = self.generation();

        match self.cancellable(generation, self.resolve_transfers(address)).await {
            Ok(activity) if !activity.is_empty() => return Ok(activity),
            Ok(_) => debug!("no token transfers for {address}, falling back to history"),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => debug!("transfer lookup for {address} failed: {err}"),
        }

        match self.cancellable(generation, self.resolve_history(address)).await {
            Ok(activity) => Ok(activity),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                warn!("history lookup for {address} failed: {err}");
                Ok(AccountActivity::empty(address))
            }
        }
    }

    /// Specialized tier: token transfers, already bounded to top-N by the
    /// client. Each transfer row becomes a one-transaction record.
    async fn resolve_transfers(&self, address: &str) -> RpcResult<AccountActivity> {
        // Ride out rate-limit exhaustion the pool already gave up on; a new
        // attempt gets a rotated endpoint and a fresh window.
        let transfers = with_backoff(&self.config.pool.backoff, address, || {
            self.client.token_transfers(address, self.config.top_transfers)
        })
        .await?;

        let transactions = transfers
            .into_iter()
            .map(|transfer| {
                let mut participants = vec![transfer.source.clone()];
                if let Some(destination) = &transfer.destination {
                    participants.push(destination.clone());
                }
                let transfer_target = transfer
                    .destination
                    .clone()
                    .unwrap_or_else(|| transfer.source.clone());
                TransactionRecord {
                    signature: transfer.signature,
                    success: true,
                    block_time: transfer.block_time,
                    participants,
                    transfers: vec![TransferRecord {
                        account: transfer_target,
                        amount: transfer.amount,
                    }],
                }
            })
            .collect();

        Ok(AccountActivity {
            address: address.to_string(),
            transactions,
        })
    }

    /// Generic tier: signature history plus per-signature detail, fetched
    /// concurrently. A failed detail drops that row only.
    async fn resolve_history(&self, address: &str) -> RpcResult<AccountActivity> {
        let records = with_backoff(&self.config.pool.backoff, address, || {
            self.client
                .signatures_for_address(address, self.config.history_limit)
        })
        .await?;

        let details = join_all(
            records
                .iter()
                .map(|record| self.detail_cached(&record.signature)),
        )
        .await;

        let transactions = details
            .into_iter()
            .flatten()
            .map(|detail| TransactionRecord::from_detail(&detail))
            .collect();

        Ok(AccountActivity {
            address: address.to_string(),
            transactions,
        })
    }

    /// Transaction detail with the session cache in front of the network.
    pub async fn detail_cached(&self, signature: &str) -> Option<TransactionDetail> {
        if let Some(detail) = self.tx_cache.get(signature) {
            return Some(detail);
        }

        match self.client.transaction_detail(signature).await {
            Ok(Some(detail)) => {
                self.tx_cache.insert(detail.clone());
                Some(detail)
            }
            Ok(None) => None,
            Err(err) if err.is_cancelled() => {
                debug!("detail fetch for {signature} superseded");
                None
            }
            Err(err) => {
                warn!("detail fetch for {signature} failed: {err}");
                None
            }
        }
    }
}
