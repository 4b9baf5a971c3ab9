//! # Supplier Fan-out
//!
//! Sends the whole tree to every configured supplier at once, waits for all
//! of them, and hangs each answer under this domain's node in configured
//! order. The join is a plain barrier: every dispatch ends in either a
//! response subtree or a `Failed` node, and only then does the merge run.
//!
//! ```text
//!             ┌──► supplier 0 ──► subtree / Failed ─┐
//!   encode ───┼──► supplier 1 ──► subtree / Failed ─┼──► merge ──► choose
//!             └──► supplier n ──► subtree / Failed ─┘
//! ```
//!
//! A supplier failing never fails the fan-out. Timeouts, transport errors,
//! non-200 statuses, undecodable bodies, subtrees with dangling selections,
//! answers that would overflow the tree, and (optionally) responses whose
//! root record does not verify all become `Failed` leaves signed by this
//! domain against the auction root.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use rand::Rng;
use tracing::{debug, info, warn};

use super::transport::SupplierTransport;
use super::winner::choose;
use crate::config::{
    FAILED_CORRUPT_RESPONSE, FAILED_OVERSIZED_RESPONSE, FAILED_TIMEOUT,
    FAILED_UNVERIFIED_RESPONSE, MAX_TREE_NODES,
};
use crate::error::ProtocolError;
use crate::payload::{Failed, Payload};
use crate::record::{verify, verify_anchored, RecordId, RecordSigner, SignedRecord};
use crate::tree::{decode, encode, NodeId, TransactionTree};

/// What happened to one supplier dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The supplier answered with a usable subtree of this many nodes.
    /// `anchored` is false when its root is bound to some other auction.
    Responded { nodes: usize, anchored: bool },
    /// The supplier was replaced by a `Failed` node with this error.
    Failed { error: String },
}

/// Per-supplier outcomes of one fan-out, in configured order.
#[derive(Debug, Clone)]
pub struct FanoutReport {
    pub outcomes: Vec<(String, DispatchOutcome)>,
    pub selection: Option<usize>,
    pub elapsed: Duration,
}

impl FanoutReport {
    pub fn dispatched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DispatchOutcome::Failed { .. }))
            .count()
    }
}

/// Concurrent dispatch to a domain's suppliers.
#[derive(Clone)]
pub struct SupplierFanout {
    transport: Arc<dyn SupplierTransport>,
    timeout: Duration,
    verify_responses: bool,
    max_tree_nodes: usize,
}

impl std::fmt::Debug for SupplierFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplierFanout")
            .field("timeout", &self.timeout)
            .field("verify_responses", &self.verify_responses)
            .field("max_tree_nodes", &self.max_tree_nodes)
            .finish()
    }
}

impl SupplierFanout {
    pub fn new(transport: Arc<dyn SupplierTransport>, timeout: Duration, verify_responses: bool) -> Self {
        Self {
            transport,
            timeout,
            verify_responses,
            max_tree_nodes: MAX_TREE_NODES,
        }
    }

    /// Caps the size of the merged tree. Defaults to [`MAX_TREE_NODES`], the
    /// limit every caller's decoder enforces.
    pub fn with_max_tree_nodes(mut self, max: usize) -> Self {
        self.max_tree_nodes = max;
        self
    }

    /// Dispatches the tree to every supplier and merges the answers as
    /// children of `node`, then chooses a winner among them.
    ///
    /// `node` must be this domain's own node, already linked into `tree`.
    /// The returned report lists every dispatch in `suppliers` order; the
    /// children appended to `node` follow the same order.
    pub async fn fan_out<R: Rng + Send + ?Sized>(
        &self,
        signer: &dyn RecordSigner,
        suppliers: &[String],
        tree: &mut TransactionTree,
        node: NodeId,
        rng: &mut R,
    ) -> Result<FanoutReport, ProtocolError> {
        let started = Instant::now();
        let body = encode(tree)?;
        let root = tree.record(tree.root()).clone();
        let root_id = root.id();

        debug!(
            domain = signer.domain(),
            suppliers = suppliers.len(),
            bytes = body.len(),
            "fanning out"
        );

        let dispatches = suppliers
            .iter()
            .map(|supplier| self.dispatch(supplier, body.clone(), &root));
        let results = join_all(dispatches).await;

        let mut outcomes = Vec::with_capacity(suppliers.len());
        for (i, (supplier, result)) in suppliers.iter().zip(results).enumerate() {
            // One slot stays reserved for every supplier still to merge.
            let reserved = suppliers.len() - i - 1;
            let result = result.and_then(|(subtree, anchored)| {
                if tree.len() + subtree.len() + reserved > self.max_tree_nodes {
                    Err(FAILED_OVERSIZED_RESPONSE.to_string())
                } else {
                    Ok((subtree, anchored))
                }
            });
            match result {
                Ok((subtree, anchored)) => {
                    let nodes = subtree.len();
                    tree.graft(node, subtree);
                    outcomes.push((
                        supplier.clone(),
                        DispatchOutcome::Responded { nodes, anchored },
                    ));
                }
                Err(error) => {
                    warn!(domain = signer.domain(), supplier = %supplier, error = %error, "supplier failed");
                    let record = failed_record(signer, supplier, &error, root_id)?;
                    tree.add_child(node, record)?;
                    outcomes.push((supplier.clone(), DispatchOutcome::Failed { error }));
                }
            }
        }

        let selection = if tree.is_leaf(node) {
            None
        } else {
            choose(tree, node, rng)
        };
        if let Some(index) = selection {
            tree.set_selection(node, index)?;
        }

        let report = FanoutReport {
            outcomes,
            selection,
            elapsed: started.elapsed(),
        };
        info!(
            domain = signer.domain(),
            children = tree.children(node).len(),
            failures = report.failures(),
            selection = ?selection,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "fan-out complete"
        );
        Ok(report)
    }

    /// One supplier round trip. Errors carry the text that goes into the
    /// `Failed` node. On success, also reports whether the answer is
    /// anchored to `root`.
    async fn dispatch(
        &self,
        supplier: &str,
        body: Vec<u8>,
        root: &SignedRecord,
    ) -> Result<(TransactionTree, bool), String> {
        let call = self.transport.post_transaction(supplier, body);
        let bytes = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => return Err(FAILED_TIMEOUT.to_string()),
            Ok(Err(ProtocolError::SupplierFailure { reason, .. })) => return Err(reason),
            Ok(Err(other)) => return Err(other.to_string()),
            Ok(Ok(bytes)) => bytes,
        };

        let subtree = decode(&bytes).map_err(|e| {
            debug!(supplier, error = %e, "undecodable supplier response");
            FAILED_CORRUPT_RESPONSE.to_string()
        })?;
        if let Err(e) = subtree.check_selections() {
            debug!(supplier, error = %e, "supplier response has a dangling selection");
            return Err(FAILED_CORRUPT_RESPONSE.to_string());
        }

        let answer = subtree.record(subtree.root());
        if self.verify_responses && !verify(answer) {
            return Err(FAILED_UNVERIFIED_RESPONSE.to_string());
        }
        let anchored = verify_anchored(answer, root);
        if !anchored {
            warn!(
                supplier,
                signer = %answer.domain,
                "supplier response is not anchored to this auction"
            );
        }
        Ok((subtree, anchored))
    }
}

/// A `Failed` record for `supplier`, signed by this domain against the
/// auction root.
pub fn failed_record(
    signer: &dyn RecordSigner,
    supplier: &str,
    error: &str,
    root_id: RecordId,
) -> Result<SignedRecord, ProtocolError> {
    let payload = Payload::Failed(Failed {
        host: supplier.to_string(),
        error: error.to_string(),
    });
    Ok(signer.create_signed(payload.to_bytes()?, Some(root_id))?)
}
