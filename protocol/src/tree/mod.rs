//! # Transaction Trees
//!
//! An auction is a tree of signed records. The publisher's Offer is the
//! root; every processor that takes part adds one node under the leaf it was
//! handed, and the nodes its suppliers return become that node's children.
//!
//! ```text
//! node.rs : TransactionTree arena, NodeId, structural operations
//! codec.rs: nested JSON transport encoding and the decode linking pass
//! ```

pub mod codec;
pub mod node;

pub use codec::{decode, encode, encode_subtree, WireNode};
pub use node::{NodeId, TransactionTree};
