use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Everything the visualization layer can learn from the engine: incremental
/// deltas, progress, and scoped warnings. The engine itself never renders.
#[derive(Debug, Clone, Serialize)]
pub enum ExplorerEvent {
    AccountAdded {
        address: String,
        depth: u32,
    },
    TransactionAdded {
        signature: String,
    },
    EdgeAdded {
        source: String,
        target: String,
        transfer: bool,
    },
    Progress {
        percent: u8,
        loaded: usize,
        discovered: usize,
    },
    AccountsExpanded {
        count: usize,
    },
    Alert {
        severity: Severity,
        scope: String,
        message: String,
    },
}

/// Fan-out bus for engine events. Subscribers that went away are pruned on
/// the next emit.
#[derive(Default)]
pub struct EventBus {
    senders: Mutex<Vec<UnboundedSender<ExplorerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ExplorerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        rx
    }

    pub fn emit(&self, event: ExplorerEvent) {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }
}
