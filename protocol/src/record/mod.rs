//! # Signed Records
//!
//! The cryptographic envelope each processor contributes to an auction.
//! The engine treats a record as opaque: it creates one through a
//! [`RecordSigner`], anchors it to the auction's root record, and asks
//! [`verify`] whether a record someone else produced is genuine.
//!
//! ```text
//! signed.rs: SignedRecord, RecordId, verify / verify_anchored
//! signer.rs: RecordSigner trait, Ed25519 DomainSigner, SignerRegistry
//! ```

pub mod signed;
pub mod signer;

pub use signed::{verify, verify_anchored, RecordId, SignedRecord};
pub use signer::{DomainSigner, RecordError, RecordSigner, SignerRegistry};
