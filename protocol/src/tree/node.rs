//! The in-memory transaction tree.
//!
//! Nodes live in an arena owned by [`TransactionTree`] and refer to each
//! other by [`NodeId`]. Parent links are plain indices, so there are no
//! reference cycles and a tree is an ordinary value that can be moved
//! between tasks, cloned, or dropped as a whole.
//!
//! Slot 0 is always the root. Nodes are only ever appended; nothing is
//! removed. Once a node's `selection` is set it never changes.

use crate::error::ProtocolError;
use crate::record::SignedRecord;

/// Index of a node inside one [`TransactionTree`]. Only meaningful for the
/// tree that handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Slot {
    record: SignedRecord,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    selection: Option<usize>,
}

/// A signed transaction tree: one record per node, children in the order
/// they were attached, and an unsigned `selection` per node for winner
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct TransactionTree {
    slots: Vec<Slot>,
}

impl TransactionTree {
    /// Creates a single-node tree rooted at `record`.
    pub fn new(root: SignedRecord) -> Self {
        Self {
            slots: vec![Slot {
                record: root,
                parent: None,
                children: Vec::new(),
                selection: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the tree. Never zero.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn record(&self, id: NodeId) -> &SignedRecord {
        &self.slots[id.0].record
    }

    /// Mutable access to a record. Only the bad-actor demonstration rewrites
    /// a record in place; everything else treats records as immutable.
    pub(crate) fn record_mut(&mut self, id: NodeId) -> &mut SignedRecord {
        &mut self.slots[id.0].record
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    pub fn selection(&self, id: NodeId) -> Option<usize> {
        self.slots[id.0].selection
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.slots[id.0].children.is_empty()
    }

    /// All node ids, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.slots.len()).map(NodeId)
    }

    /// All leaves, in arena order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.ids().filter(|&id| self.is_leaf(id)).collect()
    }

    /// Returns the single leaf of the tree: the position of the processor
    /// that sent it. More than one leaf means the caller disclosed more of
    /// the auction than this hop should see.
    pub fn leaf(&self) -> Result<NodeId, ProtocolError> {
        let leaves = self.leaves();
        match leaves.as_slice() {
            [only] => Ok(*only),
            [] => Err(ProtocolError::MalformedTransaction(
                "tree has no leaf".into(),
            )),
            many => Err(ProtocolError::MalformedTransaction(format!(
                "expected exactly one leaf, found {}",
                many.len()
            ))),
        }
    }

    /// Attaches a signed record as the last child of `parent`.
    ///
    /// The record must already be signed: its binding to the auction has to
    /// exist before it becomes part of the tree.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        record: SignedRecord,
    ) -> Result<NodeId, ProtocolError> {
        if !record.is_signed() {
            return Err(ProtocolError::CorruptTree(format!(
                "refusing to link unsigned record from '{}'",
                record.domain
            )));
        }
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            record,
            parent: Some(parent),
            children: Vec::new(),
            selection: None,
        });
        self.slots[parent.0].children.push(id);
        Ok(id)
    }

    /// Appends every node of `subtree` under `parent`, preserving its shape
    /// and selections. Returns the id the subtree's root received.
    pub fn graft(&mut self, parent: NodeId, subtree: TransactionTree) -> NodeId {
        let offset = self.slots.len();
        let grafted_root = NodeId(offset);
        for slot in subtree.slots {
            self.slots.push(Slot {
                record: slot.record,
                parent: Some(match slot.parent {
                    Some(p) => NodeId(p.0 + offset),
                    None => parent,
                }),
                children: slot
                    .children
                    .into_iter()
                    .map(|c| NodeId(c.0 + offset))
                    .collect(),
                selection: slot.selection,
            });
        }
        self.slots[parent.0].children.push(grafted_root);
        grafted_root
    }

    /// Copies the subtree rooted at `id` into a tree of its own. Ancestors
    /// are not included.
    pub fn subtree(&self, id: NodeId) -> TransactionTree {
        let mut out = TransactionTree::new(self.record(id).clone());
        out.slots[0].selection = self.selection(id);

        let mut stack: Vec<(NodeId, NodeId)> = self
            .children(id)
            .iter()
            .rev()
            .map(|&c| (c, out.root()))
            .collect();
        while let Some((src, dst_parent)) = stack.pop() {
            let dst = NodeId(out.slots.len());
            out.slots.push(Slot {
                record: self.record(src).clone(),
                parent: Some(dst_parent),
                children: Vec::new(),
                selection: self.selection(src),
            });
            out.slots[dst_parent.0].children.push(dst);
            stack.extend(self.children(src).iter().rev().map(|&c| (c, dst)));
        }
        out
    }

    /// Records the winner among `id`'s children. Fails if the index is out
    /// of range or a selection was already made.
    pub fn set_selection(&mut self, id: NodeId, index: usize) -> Result<(), ProtocolError> {
        let slot = &mut self.slots[id.0];
        if slot.selection.is_some() {
            return Err(ProtocolError::CorruptTree(format!(
                "selection of node {} is already set",
                id.0
            )));
        }
        if index >= slot.children.len() {
            return Err(ProtocolError::CorruptTree(format!(
                "selection {} out of range for {} children",
                index,
                slot.children.len()
            )));
        }
        slot.selection = Some(index);
        Ok(())
    }

    /// Checks that every recorded selection names an existing child.
    pub fn check_selections(&self) -> Result<(), ProtocolError> {
        for id in self.ids() {
            let slot = &self.slots[id.0];
            if let Some(index) = slot.selection {
                if index >= slot.children.len() {
                    return Err(ProtocolError::CorruptTree(format!(
                        "selection {} of '{}' names one of {} children",
                        index,
                        slot.record.domain,
                        slot.children.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Restores a selection read off the wire without range checks. The
    /// winner walk rejects indices that do not name a child.
    pub(crate) fn restore_selection(&mut self, id: NodeId, index: usize) {
        self.slots[id.0].selection = Some(index);
    }

    /// Path from `id` up to and including the root.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(p) = self.parent(current) {
            path.push(p);
            current = p;
        }
        path
    }

    /// Nodes of the subtree at `id` in pre-order (parent before children,
    /// children in attachment order).
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev());
        }
        out
    }

    /// Number of edges between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        self.path_to_root(id).len() - 1
    }
}

/// Structural equality: same records, same selections, same children in the
/// same order. Arena layout is ignored, so a tree equals its decoded copy
/// even though decoding renumbers nodes.
impl PartialEq for TransactionTree {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self.root(), other.root())];
        while let Some((a, b)) = stack.pop() {
            if self.record(a) != other.record(b) || self.selection(a) != other.selection(b) {
                return false;
            }
            let (ca, cb) = (self.children(a), other.children(b));
            if ca.len() != cb.len() {
                return false;
            }
            stack.extend(ca.iter().copied().zip(cb.iter().copied()));
        }
        true
    }
}

impl Eq for TransactionTree {}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(domain: &str) -> SignedRecord {
        let mut r = SignedRecord::new(domain, vec![], 0);
        r.signature = Some("00".into());
        r
    }

    /// root
    /// ├── a
    /// │   └── a1
    /// └── b
    fn sample() -> (TransactionTree, NodeId, NodeId, NodeId) {
        let mut t = TransactionTree::new(rec("root"));
        let a = t.add_child(t.root(), rec("a")).unwrap();
        let b = t.add_child(t.root(), rec("b")).unwrap();
        let a1 = t.add_child(a, rec("a1")).unwrap();
        (t, a, b, a1)
    }

    #[test]
    fn single_node_tree_is_its_own_leaf() {
        let t = TransactionTree::new(rec("root"));
        assert_eq!(t.leaf().unwrap(), t.root());
        assert_eq!(t.len(), 1);
        assert!(!t.is_empty());
    }

    #[test]
    fn two_leaves_are_malformed() {
        let (t, ..) = sample();
        assert!(matches!(t.leaf(), Err(ProtocolError::MalformedTransaction(_))));
    }

    #[test]
    fn add_child_sets_parent() {
        let (t, a, b, a1) = sample();
        assert_eq!(t.parent(a1), Some(a));
        assert_eq!(t.parent(a), Some(t.root()));
        assert_eq!(t.children(t.root()), &[a, b]);
        assert_eq!(t.parent(t.root()), None);
    }

    #[test]
    fn unsigned_record_cannot_be_linked() {
        let mut t = TransactionTree::new(rec("root"));
        let unsigned = SignedRecord::new("x", vec![], 0);
        assert!(matches!(
            t.add_child(t.root(), unsigned),
            Err(ProtocolError::CorruptTree(_))
        ));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn graft_remaps_ids_and_keeps_selection() {
        let (mut sub, _, _, _) = sample();
        sub.set_selection(sub.root(), 1).unwrap();

        let mut t = TransactionTree::new(rec("top"));
        let grafted = t.graft(t.root(), sub.clone());
        assert_eq!(t.len(), 5);
        assert_eq!(t.parent(grafted), Some(t.root()));
        assert_eq!(t.record(grafted).domain, "root");
        assert_eq!(t.selection(grafted), Some(1));
        assert_eq!(t.subtree(grafted), sub);
    }

    #[test]
    fn subtree_excludes_ancestors() {
        let (t, a, _, a1) = sample();
        let s = t.subtree(a);
        assert_eq!(s.len(), 2);
        assert_eq!(s.record(s.root()).domain, "a");
        assert_eq!(s.parent(s.root()), None);
        let only = s.leaf().unwrap();
        assert_eq!(s.record(only), t.record(a1));
    }

    #[test]
    fn selection_is_set_once_and_in_range() {
        let (mut t, a, ..) = sample();
        assert!(t.set_selection(a, 1).is_err());
        t.set_selection(a, 0).unwrap();
        assert!(matches!(t.set_selection(a, 0), Err(ProtocolError::CorruptTree(_))));
        assert_eq!(t.selection(a), Some(0));
    }

    #[test]
    fn path_and_depth() {
        let (t, a, _, a1) = sample();
        assert_eq!(t.path_to_root(a1), vec![a1, a, t.root()]);
        assert_eq!(t.depth(a1), 2);
        assert_eq!(t.depth(t.root()), 0);
    }

    #[test]
    fn preorder_visits_children_in_order() {
        let (t, a, b, a1) = sample();
        assert_eq!(t.preorder(t.root()), vec![t.root(), a, a1, b]);
    }

    #[test]
    fn equality_ignores_arena_layout() {
        // Same shape, built in a different attachment order.
        let (t1, ..) = sample();
        let mut t2 = TransactionTree::new(rec("root"));
        let a = t2.add_child(t2.root(), rec("a")).unwrap();
        t2.add_child(a, rec("a1")).unwrap();
        t2.add_child(t2.root(), rec("b")).unwrap();
        assert_eq!(t1, t2);

        t2.set_selection(a, 0).unwrap();
        assert_ne!(t1, t2);
    }
}
