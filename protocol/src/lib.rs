//! # SWAN Protocol: Core Library
//!
//! A real-time-bidding exchange where every organization that touches an
//! advertising request leaves a signed record behind. The records form a
//! tree: the publisher's Offer at the root, each processor's contribution
//! under whoever called it, and failed calls kept as explicit markers instead
//! of silently dropped. Anyone holding the finished tree can replay how the
//! winner was picked and check every signature on the way.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys and SHA-256. Typed wrappers, nothing more.
//! - **record**: The signed record envelope and the signer collaborator.
//! - **payload**: Offer / Bid / Empty / Failed, the things records carry.
//! - **tree**: The transaction tree arena and its wire codec.
//! - **exchange**: Processing, supplier fan-out, and winner resolution.
//! - **audit**: After-the-fact verification of a finished tree.
//! - **config**: Protocol constants.
//! - **error**: The error taxonomy every operation reports through.
//!
//! ## A Round Trip
//!
//! ```text
//! publisher ── Offer ──► SSP ── full tree ──► DSP-a ──► Bid subtree ──┐
//!                         │ ── full tree ──► DSP-b ──► 503 ─► Failed ─┤
//!                         ◄──────────── merge, choose ─────────────────┘
//! ```
//!
//! Each hop answers with its own subtree only, so a caller learns what its
//! suppliers did without learning what the rest of the exchange saw.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod payload;
pub mod record;
pub mod tree;

pub use error::ProtocolError;
