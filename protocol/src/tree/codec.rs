//! Tree encoding for transport.
//!
//! A tree travels as nested JSON: each node is an object holding its signed
//! record, its `selection` (when set) and its children in order. Parent
//! links are not stored; [`decode`] rebuilds them in a separate linking pass
//! over the parsed structure.
//!
//! ```json
//! {
//!   "record": { "version": 1, "domain": "pub.example", ... },
//!   "selection": 0,
//!   "children": [ { "record": { ... } } ]
//! }
//! ```
//!
//! `selection` sits beside the record, never inside it. It is bookkeeping,
//! not an attested fact.

use serde::{Deserialize, Serialize};

use super::node::{NodeId, TransactionTree};
use crate::config::MAX_TREE_NODES;
use crate::error::ProtocolError;
use crate::record::SignedRecord;

/// One node of the transport representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireNode {
    pub record: SignedRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WireNode>,
}

/// Encodes the whole tree, root first. Used when dispatching to suppliers,
/// who need the root Offer to validate the chain.
pub fn encode(tree: &TransactionTree) -> Result<Vec<u8>, ProtocolError> {
    encode_subtree(tree, tree.root())
}

/// Encodes only the subtree at `id`, disclosing none of its ancestors.
pub fn encode_subtree(tree: &TransactionTree, id: NodeId) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(&to_wire(tree, id))
        .map_err(|e| ProtocolError::CorruptEncoding(e.to_string()))
}

/// Decodes an encoded tree. Either the whole input is valid and a complete
/// tree comes back, or nothing does.
pub fn decode(bytes: &[u8]) -> Result<TransactionTree, ProtocolError> {
    let wire: WireNode =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::CorruptEncoding(e.to_string()))?;
    from_wire(wire)
}

/// Builds the transport representation of the subtree at `id`.
pub fn to_wire(tree: &TransactionTree, id: NodeId) -> WireNode {
    WireNode {
        record: tree.record(id).clone(),
        selection: tree.selection(id),
        children: tree
            .children(id)
            .iter()
            .map(|&child| to_wire(tree, child))
            .collect(),
    }
}

/// Linking pass: flattens a parsed [`WireNode`] into a tree, attaching each
/// node to its parent in order.
pub fn from_wire(wire: WireNode) -> Result<TransactionTree, ProtocolError> {
    let WireNode {
        record,
        selection,
        children,
    } = wire;
    check_signed(&record)?;

    let mut tree = TransactionTree::new(record);
    let root = tree.root();
    if let Some(index) = selection {
        // An out-of-range index is kept as-is: selection is untrusted
        // bookkeeping and the winner walk reports it as a corrupt tree.
        tree.restore_selection(root, index);
    }

    let mut stack: Vec<(WireNode, NodeId)> = children.into_iter().rev().map(|c| (c, root)).collect();
    while let Some((node, parent)) = stack.pop() {
        if tree.len() >= MAX_TREE_NODES {
            return Err(ProtocolError::CorruptEncoding(format!(
                "tree exceeds {} nodes",
                MAX_TREE_NODES
            )));
        }
        check_signed(&node.record)?;
        let id = tree.add_child(parent, node.record)?;
        if let Some(index) = node.selection {
            tree.restore_selection(id, index);
        }
        stack.extend(node.children.into_iter().rev().map(|c| (c, id)));
    }
    Ok(tree)
}

fn check_signed(record: &SignedRecord) -> Result<(), ProtocolError> {
    if record.is_signed() {
        Ok(())
    } else {
        Err(ProtocolError::CorruptEncoding(format!(
            "record from '{}' carries no signature",
            record.domain
        )))
    }
}
