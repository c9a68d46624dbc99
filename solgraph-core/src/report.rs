use chrono::Utc;

use crate::builder::ExpandSummary;
use crate::graph::{AccountStatus, EdgeKind, GraphNode, GraphSnapshot};

/// Render a plain-text summary of a constructed graph.
pub fn generate_graph_report(snapshot: &GraphSnapshot, summary: &ExpandSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");

    let accounts: Vec<_> = snapshot.nodes.iter().filter(|n| n.is_account()).collect();
    let loaded = accounts
        .iter()
        .filter(|node| {
            matches!(
                node,
                GraphNode::Account {
                    status: AccountStatus::Loaded,
                    ..
                }
            )
        })
        .count();
    let transactions = snapshot.nodes.iter().filter(|n| n.is_transaction()).count();

    report.push_str(&format!(
        "  Accounts: {} ({} loaded, {} pending)\n",
        accounts.len(),
        loaded,
        accounts.len() - loaded
    ));
    report.push_str(&format!("  Transactions: {transactions}\n"));
    report.push_str(&format!("  Edges: {}\n", snapshot.edges.len()));
    report.push_str(&format!(
        "  Discovered: {} accounts, {} expanded\n",
        summary.accounts_discovered, summary.accounts_loaded
    ));
    report.push_str(&format!(
        "  Generated: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    // Largest transfers first.
    let mut transfers: Vec<(&str, &str, u64)> = snapshot
        .edges
        .iter()
        .filter_map(|edge| match edge.kind {
            EdgeKind::Transfer { amount } => {
                Some((edge.source.as_str(), edge.target.as_str(), amount))
            }
            _ => None,
        })
        .collect();
    transfers.sort_by(|a, b| b.2.cmp(&a.2));

    if !transfers.is_empty() {
        report.push_str("\n## Largest transfers:\n");
        for &(source, target, amount) in transfers.iter().take(10) {
            report.push_str(&format!("  {amount:>14} {} -> {}\n", short(source), short(target)));
        }
    }

    let failed: Vec<&str> = snapshot
        .nodes
        .iter()
        .filter_map(|node| match node {
            GraphNode::Transaction {
                signature,
                success: false,
                ..
            } => Some(signature.as_str()),
            _ => None,
        })
        .collect();

    if !failed.is_empty() {
        report.push_str("\n## Failed transactions:\n");
        for &signature in failed.iter().take(10) {
            report.push_str(&format!("  {}\n", short(signature)));
        }
    }

    report
}

/// Shorten a base58 id for terminal display.
fn short(id: &str) -> String {
    if id.len() <= 16 {
        id.to_string()
    } else {
        format!("{}..{}", &id[..8], &id[id.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FlowGraph, SnapshotEdge};

    #[test]
    fn report_counts_nodes_and_transfers() {
        let mut graph = FlowGraph::new();
        graph.insert_account("walletA", AccountStatus::Pending);
        graph.insert_account("walletB", AccountStatus::Pending);
        graph.insert_transaction("sig1", true, Some(1_700_000_000));
        graph.insert_edge("walletA", "sig1", EdgeKind::AccountToTransaction);
        graph.insert_edge("sig1", "walletB", EdgeKind::Transfer { amount: 42 });
        graph.mark_loaded("walletA", 1);

        let summary = ExpandSummary {
            nodes: 3,
            edges: 2,
            accounts_loaded: 1,
            accounts_discovered: 2,
        };
        let report = generate_graph_report(&graph.snapshot(), &summary);

        assert!(report.contains("Accounts: 2 (1 loaded, 1 pending)"));
        assert!(report.contains("Transactions: 1"));
        assert!(report.contains("Largest transfers:"));
        assert!(report.contains("42"));
    }

    #[test]
    fn long_ids_are_shortened() {
        let snapshot = GraphSnapshot {
            nodes: vec![],
            edges: vec![SnapshotEdge {
                source: "5j7s6NiJS3JAkvgkoc18WVAsiSaci2pxB2A6ueCJP4tp".to_string(),
                target: "walletB".to_string(),
                kind: EdgeKind::Transfer { amount: 7 },
            }],
        };
        let report = generate_graph_report(&snapshot, &ExpandSummary::default());
        assert!(report.contains("5j7s6NiJ..P4tp"));
    }
}
