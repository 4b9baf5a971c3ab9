//! # Winner Resolution
//!
//! Two halves: [`choose`] runs once per node, right after its fan-out, and
//! picks one eligible child; [`resolve_path`] runs any time later and
//! follows those picks from the root to the winning node.
//!
//! A child is eligible when it is a `Bid`, or when it already chose a winner
//! among its own children (its branch produced a decision). `Empty` and
//! `Failed` leaves never win. The pick among eligible children is uniform,
//! drawn from the random source the caller passes in.

use rand::Rng;
use tracing::warn;

use crate::error::ProtocolError;
use crate::payload::{Bid, Payload};
use crate::tree::{NodeId, TransactionTree};

/// Returns `true` if `child` can be chosen as its parent's winner.
pub fn is_eligible(tree: &TransactionTree, child: NodeId) -> bool {
    if !tree.is_leaf(child) && tree.selection(child).is_some() {
        return true;
    }
    match Payload::resolve(tree.record(child)) {
        Ok(payload) => payload.is_bid(),
        Err(e) => {
            warn!(
                domain = %tree.record(child).domain,
                error = %e,
                "ignoring child with undecodable payload"
            );
            false
        }
    }
}

/// Picks the winning child of `node`. `None` when no child is eligible.
pub fn choose<R: Rng + ?Sized>(tree: &TransactionTree, node: NodeId, rng: &mut R) -> Option<usize> {
    let eligible: Vec<usize> = tree
        .children(node)
        .iter()
        .enumerate()
        .filter(|(_, child)| is_eligible(tree, **child))
        .map(|(i, _)| i)
        .collect();

    if eligible.is_empty() {
        return None;
    }
    Some(eligible[rng.gen_range(0..eligible.len())])
}

/// Nodes on the winner path, root first.
pub fn winning_path(tree: &TransactionTree) -> Result<Vec<NodeId>, ProtocolError> {
    let mut path = vec![tree.root()];
    let mut current = tree.root();
    while let Some(index) = tree.selection(current) {
        let children = tree.children(current);
        let next = *children.get(index).ok_or_else(|| {
            ProtocolError::CorruptTree(format!(
                "selection {} of '{}' names one of {} children",
                index,
                tree.record(current).domain,
                children.len()
            ))
        })?;
        path.push(next);
        current = next;
    }
    Ok(path)
}

/// Follows selections from the root to the node where they stop.
///
/// An out-of-range selection is [`ProtocolError::CorruptTree`]; it is
/// never clamped.
pub fn resolve_path(tree: &TransactionTree) -> Result<NodeId, ProtocolError> {
    let path = winning_path(tree)?;
    Ok(path[path.len() - 1])
}

/// The Bid at the end of the winner path, if the auction produced one.
pub fn winning_bid(tree: &TransactionTree) -> Result<Option<Bid>, ProtocolError> {
    let winner = resolve_path(tree)?;
    match Payload::resolve(tree.record(winner))? {
        Payload::Bid(bid) => Ok(Some(bid)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Failed;
    use crate::record::SignedRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rec(domain: &str, payload: &Payload) -> SignedRecord {
        let mut r = SignedRecord::new(domain, payload.to_bytes().unwrap(), 0);
        r.signature = Some("00".into());
        r
    }

    fn bid(adv: &str) -> Payload {
        Payload::Bid(Bid {
            advertiser_url: adv.into(),
            media_url: format!("{adv}/a.png"),
        })
    }

    fn failed(host: &str) -> Payload {
        Payload::Failed(Failed {
            host: host.into(),
            error: "503".into(),
        })
    }

    #[test]
    fn bid_beats_empty_every_time() {
        let mut tree = TransactionTree::new(rec("ssp", &Payload::Empty));
        let root = tree.root();
        tree.add_child(root, rec("dsp-a", &bid("adv.example"))).unwrap();
        tree.add_child(root, rec("dsp-b", &Payload::Empty)).unwrap();

        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(choose(&tree, root, &mut rng), Some(0));
        }
    }

    #[test]
    fn no_eligible_children_means_no_winner() {
        let mut tree = TransactionTree::new(rec("ssp", &Payload::Empty));
        let root = tree.root();
        tree.add_child(root, rec("dsp-a", &Payload::Empty)).unwrap();
        tree.add_child(root, rec("dsp-b", &failed("dsp-b"))).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(choose(&tree, root, &mut rng), None);
    }

    #[test]
    fn decided_branch_is_eligible() {
        let mut tree = TransactionTree::new(rec("pub", &Payload::Empty));
        let root = tree.root();
        let ssp = tree.add_child(root, rec("ssp", &Payload::Empty)).unwrap();
        tree.add_child(ssp, rec("dsp", &bid("adv.example"))).unwrap();

        // Undecided: the branch has children but no selection yet.
        assert!(!is_eligible(&tree, ssp));
        tree.set_selection(ssp, 0).unwrap();
        assert!(is_eligible(&tree, ssp));
    }

    #[test]
    fn undecodable_payload_is_ineligible() {
        let mut tree = TransactionTree::new(rec("ssp", &Payload::Empty));
        let mut junk = SignedRecord::new("dsp", b"\x00\x01".to_vec(), 0);
        junk.signature = Some("00".into());
        let child = tree.add_child(tree.root(), junk).unwrap();
        assert!(!is_eligible(&tree, child));
    }

    #[test]
    fn choose_is_reproducible_with_a_seed() {
        let mut tree = TransactionTree::new(rec("ssp", &Payload::Empty));
        let root = tree.root();
        for i in 0..5 {
            tree.add_child(root, rec(&format!("dsp-{i}"), &bid("adv.example")))
                .unwrap();
        }
        let a = choose(&tree, root, &mut StdRng::seed_from_u64(42));
        let b = choose(&tree, root, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert!(a.unwrap() < 5);
    }

    #[test]
    fn resolve_follows_selections() {
        let mut tree = TransactionTree::new(rec("pub", &Payload::Empty));
        let root = tree.root();
        let ssp = tree.add_child(root, rec("ssp", &Payload::Empty)).unwrap();
        tree.add_child(ssp, rec("dsp-a", &Payload::Empty)).unwrap();
        let win = tree.add_child(ssp, rec("dsp-b", &bid("adv-y.com"))).unwrap();
        tree.set_selection(ssp, 1).unwrap();
        tree.set_selection(root, 0).unwrap();

        assert_eq!(resolve_path(&tree).unwrap(), win);
        assert_eq!(resolve_path(&tree).unwrap(), win);
        assert_eq!(winning_path(&tree).unwrap(), vec![root, ssp, win]);
        assert_eq!(winning_bid(&tree).unwrap().unwrap().advertiser_url, "adv-y.com");
    }

    #[test]
    fn resolve_without_selection_stops_at_root() {
        let mut tree = TransactionTree::new(rec("pub", &Payload::Empty));
        tree.add_child(tree.root(), rec("dsp", &Payload::Empty)).unwrap();
        assert_eq!(resolve_path(&tree).unwrap(), tree.root());
        assert_eq!(winning_bid(&tree).unwrap(), None);
    }

    #[test]
    fn out_of_range_selection_is_corrupt() {
        let mut tree = TransactionTree::new(rec("pub", &Payload::Empty));
        tree.add_child(tree.root(), rec("dsp", &bid("adv.example"))).unwrap();
        tree.restore_selection(tree.root(), 3);
        assert!(matches!(resolve_path(&tree), Err(ProtocolError::CorruptTree(_))));
    }
}
