//! Error types for the transaction-tree engine.
//!
//! Every fallible engine operation returns a [`ProtocolError`]. The variants
//! split into three groups: caller mistakes (the request is rejected),
//! operator mistakes (the domain is misconfigured), and invariant violations
//! (the tree itself is broken). Supplier failures are the odd one out: they
//! are absorbed into the tree as `Failed` nodes and only surface as an error
//! when a transport wants to describe what went wrong.

use thiserror::Error;

use crate::payload::PayloadError;
use crate::record::RecordError;

/// Errors that can occur while processing a transaction.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The incoming tree does not have exactly one leaf. Either too much of
    /// the tree was disclosed to this hop, or it is empty.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The root record does not carry a decodable Offer.
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// This domain has no registered signer.
    #[error("domain '{0}' is not registered to sign records")]
    SigningUnavailable(String),

    /// A single supplier dispatch failed. Never returned by the fan-out
    /// itself; transports use it to describe the failure that ends up in a
    /// `Failed` node.
    #[error("supplier {host} failed: {reason}")]
    SupplierFailure {
        /// Supplier host that failed.
        host: String,
        /// Status code or transport error text.
        reason: String,
    },

    /// An in-memory invariant of the tree is broken (out-of-range selection,
    /// selection set twice, dangling node id).
    #[error("corrupt tree: {0}")]
    CorruptTree(String),

    /// An encoded tree could not be decoded.
    #[error("corrupt encoding: {0}")]
    CorruptEncoding(String),
}

impl ProtocolError {
    /// Returns `true` for errors caused by the caller's input, which the
    /// HTTP layer reports as 400-class.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedTransaction(_)
                | ProtocolError::InvalidOffer(_)
                | ProtocolError::CorruptEncoding(_)
        )
    }
}

impl From<RecordError> for ProtocolError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::SignerMissing(domain) => ProtocolError::SigningUnavailable(domain),
            other => ProtocolError::CorruptTree(other.to_string()),
        }
    }
}

impl From<PayloadError> for ProtocolError {
    fn from(e: PayloadError) -> Self {
        ProtocolError::CorruptEncoding(e.to_string())
    }
}
