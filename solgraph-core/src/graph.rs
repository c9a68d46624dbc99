use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Pending,
    Loaded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphNode {
    Account {
        address: String,
        status: AccountStatus,
        transaction_count: usize,
    },
    Transaction {
        signature: String,
        success: bool,
        block_time: Option<i64>,
    },
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Account { address, .. } => address,
            GraphNode::Transaction { signature, .. } => signature,
        }
    }

    pub fn is_account(&self) -> bool {
        matches!(self, GraphNode::Account { .. })
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, GraphNode::Transaction { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    AccountToTransaction,
    TransactionToAccount,
    Transfer { amount: u64 },
}

/// Deterministic composite id guaranteeing idempotent edge insertion no
/// matter how many traversal paths rediscover the same relation.
pub fn edge_id(source: &str, target: &str, kind: &EdgeKind) -> String {
    match kind {
        EdgeKind::Transfer { .. } => format!("{source}-{target}-transfer"),
        _ => format!("{source}-{target}"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// A serializable copy of the node/edge set, used for viewport replay and
/// persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<SnapshotEdge>,
}

/// The deduplicated activity graph. All mutation goes through the insertion
/// guards; a node or edge id is inserted at most once per session and nodes
/// are never removed.
#[derive(Default)]
pub struct FlowGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    indices: HashMap<String, NodeIndex>,
    edge_ids: HashSet<String>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account node. Returns false when the id already exists.
    pub fn insert_account(&mut self, address: &str, status: AccountStatus) -> bool {
        if self.indices.contains_key(address) {
            return false;
        }
        let index = self.graph.add_node(GraphNode::Account {
            address: address.to_string(),
            status,
            transaction_count: 0,
        });
        self.indices.insert(address.to_string(), index);
        true
    }

    /// Insert a transaction node. Returns false when the id already exists.
    pub fn insert_transaction(
        &mut self,
        signature: &str,
        success: bool,
        block_time: Option<i64>,
    ) -> bool {
        if self.indices.contains_key(signature) {
            return false;
        }
        let index = self.graph.add_node(GraphNode::Transaction {
            signature: signature.to_string(),
            success,
            block_time,
        });
        self.indices.insert(signature.to_string(), index);
        true
    }

    /// Insert an edge between two existing nodes. Returns false when either
    /// endpoint is missing or the composite id was already inserted.
    pub fn insert_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> bool {
        let id = edge_id(source, target, &kind);
        if self.edge_ids.contains(&id) {
            return false;
        }
        let (Some(&from), Some(&to)) = (self.indices.get(source), self.indices.get(target)) else {
            return false;
        };
        self.graph.add_edge(from, to, kind);
        self.edge_ids.insert(id);
        true
    }

    /// Transition an account node to Loaded and record how many transactions
    /// resolution saw for it. No-op for unknown or non-account ids.
    pub fn mark_loaded(&mut self, address: &str, count: usize) -> bool {
        let Some(&index) = self.indices.get(address) else {
            return false;
        };
        if let Some(GraphNode::Account {
            status,
            transaction_count,
            ..
        }) = self.graph.node_weight_mut(index)
        {
            *status = AccountStatus::Loaded;
            *transaction_count = count;
            return true;
        }
        false
    }

    pub fn contains(&self, id: &str) -> bool {
        self.indices.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.indices
            .get(id)
            .and_then(|index| self.graph.node_weight(*index))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Account ids adjacent to the given transaction, either direction.
    pub fn accounts_connected_to(&self, signature: &str) -> Vec<String> {
        let Some(&index) = self.indices.get(signature) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut accounts = Vec::new();
        for neighbor in self.graph.neighbors_undirected(index) {
            if let Some(GraphNode::Account { address, .. }) = self.graph.node_weight(neighbor)
                && seen.insert(address.clone())
            {
                accounts.push(address.clone());
            }
        }
        accounts
    }

    /// Shortest node-id chain between two ids, edges treated as undirected.
    pub fn find_path(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let &start = self.indices.get(source)?;
        let &goal = self.indices.get(target)?;
        if start == goal {
            return Some(vec![source.to_string()]);
        }

        let mut predecessors: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.graph.neighbors_undirected(current) {
                if !visited.insert(neighbor) {
                    continue;
                }
                predecessors.insert(neighbor, current);
                if neighbor == goal {
                    let mut path = vec![goal];
                    let mut cursor = goal;
                    while let Some(&previous) = predecessors.get(&cursor) {
                        path.push(previous);
                        cursor = previous;
                    }
                    path.reverse();
                    return Some(
                        path.into_iter()
                            .filter_map(|index| {
                                self.graph.node_weight(index).map(|n| n.id().to_string())
                            })
                            .collect(),
                    );
                }
                queue.push_back(neighbor);
            }
        }
        None
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self.graph.node_weights().cloned().collect();
        let edges = self
            .graph
            .edge_references()
            .filter_map(|edge| {
                let source = self.graph.node_weight(edge.source())?;
                let target = self.graph.node_weight(edge.target())?;
                Some(SnapshotEdge {
                    source: source.id().to_string(),
                    target: target.id().to_string(),
                    kind: edge.weight().clone(),
                })
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }
}
