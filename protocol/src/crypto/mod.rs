//! # Cryptographic Primitives
//!
//! Thin, typed wrappers around audited implementations: Ed25519 for record
//! signatures and SHA-256 for record identities. Nothing clever happens here
//! and nothing clever should.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_parts};
pub use keys::{DomainKeypair, DomainPublicKey, DomainSignature, KeyError};
