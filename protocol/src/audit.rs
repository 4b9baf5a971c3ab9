//! # Audit Reports
//!
//! Any party holding a finished tree can check who took part and how the
//! winner was reached. Each node is checked on its own: does its signature
//! verify, and is it bound to the root Offer of this auction?
//!
//! The root deserves special attention. Its signature covering the Offer is
//! what exposes a processor that rewrote the Offer on the way through; every
//! node below such a processor still verifies and still anchors to the
//! rewritten root, so only the root check catches it.

use serde::Serialize;

use crate::error::ProtocolError;
use crate::exchange::winner::winning_path;
use crate::payload::{Failed, Payload};
use crate::record::{verify, verify_anchored};
use crate::tree::{NodeId, TransactionTree};

/// The audit result for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Depth below the root.
    pub depth: usize,
    pub domain: String,
    /// Milliseconds since the epoch, as signed.
    pub timestamp: u64,
    /// Payload variant, or `"unknown"` when it does not decode.
    pub kind: String,
    pub signature_valid: bool,
    /// `None` for the root, which has nothing to be anchored to.
    pub anchored_to_root: Option<bool>,
    pub on_winning_path: bool,
    pub is_winner: bool,
    /// Set for `Failed` nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failed>,
}

impl AuditEntry {
    /// Signature verifies and, below the root, the anchor matches.
    pub fn is_valid(&self) -> bool {
        self.signature_valid && self.anchored_to_root.unwrap_or(true)
    }
}

/// Audit of a whole tree or of its winner path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Whether the root Offer still carries its publisher's valid signature.
    pub offer_intact: bool,
    pub winner_domain: String,
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    /// `true` when every node checked out.
    pub fn is_clean(&self) -> bool {
        self.offer_intact && self.entries.iter().all(AuditEntry::is_valid)
    }

    /// Entries that failed a check.
    pub fn invalid_entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| !e.is_valid())
    }
}

/// Audits every node, in pre-order.
pub fn audit_tree(tree: &TransactionTree) -> Result<AuditReport, ProtocolError> {
    let path = winning_path(tree)?;
    let nodes = tree.preorder(tree.root());
    Ok(report(tree, &path, &nodes))
}

/// Audits only the nodes from the root down to the winner.
pub fn audit_winner_path(tree: &TransactionTree) -> Result<AuditReport, ProtocolError> {
    let path = winning_path(tree)?;
    Ok(report(tree, &path, &path))
}

fn report(tree: &TransactionTree, path: &[NodeId], nodes: &[NodeId]) -> AuditReport {
    let root = tree.root();
    let winner = path[path.len() - 1];
    AuditReport {
        offer_intact: verify(tree.record(root)),
        winner_domain: tree.record(winner).domain.clone(),
        entries: nodes
            .iter()
            .map(|&id| entry(tree, id, path.contains(&id), id == winner))
            .collect(),
    }
}

fn entry(tree: &TransactionTree, id: NodeId, on_path: bool, is_winner: bool) -> AuditEntry {
    let record = tree.record(id);
    let payload = Payload::resolve(record).ok();
    let anchored_to_root = if id == tree.root() {
        None
    } else {
        Some(verify_anchored(record, tree.record(tree.root())))
    };

    AuditEntry {
        depth: tree.depth(id),
        domain: record.domain.clone(),
        timestamp: record.timestamp,
        kind: payload
            .as_ref()
            .map(|p| p.kind().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        signature_valid: verify(record),
        anchored_to_root,
        on_winning_path: on_path,
        is_winner,
        failure: match payload {
            Some(Payload::Failed(f)) => Some(f),
            _ => None,
        },
    }
}
