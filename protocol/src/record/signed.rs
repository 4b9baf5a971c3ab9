//! The signed record envelope.
//!
//! A [`SignedRecord`] pairs an opaque payload with the identity of the domain
//! that produced it and, for every record except an auction's root, the
//! [`RecordId`] of the record it is anchored to. The anchor is part of the
//! signed bytes, so a record cannot be re-attached to a different auction
//! after the fact.
//!
//! # Canonical Byte Format
//!
//! [`SignedRecord::signable_bytes`] concatenates: version (1 byte), domain,
//! `0x00`, timestamp (u64 LE), payload length (u32 LE), payload, anchor flag
//! (`0x00`/`0x01`) followed by the 32 anchor bytes when present, and the
//! hex public key. The signature is excluded.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RECORD_VERSION;
use crate::crypto::{sha256_parts, DomainPublicKey, DomainSignature};

/// Identity of a record: SHA-256 over its signable bytes followed by its
/// signature bytes. Serialized as a hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(#[serde(with = "hex")] [u8; 32]);

impl RecordId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_hex()[..12])
    }
}

/// A verifiable unit of an auction: payload, signer, anchor, signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRecord {
    /// Layout version, see [`RECORD_VERSION`].
    pub version: u8,

    /// Domain of the organization that created and signed this record.
    pub domain: String,

    /// Unix timestamp in milliseconds at creation.
    pub timestamp: u64,

    /// Opaque payload bytes, interpreted by [`crate::payload::Payload`].
    #[serde(with = "hex")]
    pub payload: Vec<u8>,

    /// Record this one is bound to. `None` only for auction roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<RecordId>,

    /// Hex-encoded Ed25519 public key of the signer. Set during signing.
    pub public_key: Option<String>,

    /// Hex-encoded Ed25519 signature over [`Self::signable_bytes`].
    /// `None` until signed.
    pub signature: Option<String>,
}

impl SignedRecord {
    /// Creates an unsigned record for `domain`.
    pub fn new(domain: impl Into<String>, payload: Vec<u8>, timestamp: u64) -> Self {
        Self {
            version: RECORD_VERSION,
            domain: domain.into(),
            timestamp,
            payload,
            anchor: None,
            public_key: None,
            signature: None,
        }
    }

    /// Canonical bytes covered by the signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.domain.len() + self.payload.len());
        buf.push(self.version);

        buf.extend_from_slice(self.domain.as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&self.timestamp.to_le_bytes());

        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        match &self.anchor {
            Some(anchor) => {
                buf.push(0x01);
                buf.extend_from_slice(anchor.as_bytes());
            }
            None => buf.push(0x00),
        }

        if let Some(ref pk) = self.public_key {
            buf.extend_from_slice(pk.as_bytes());
        }
        buf
    }

    /// Identity of this record as it stands now. Changes if any signed
    /// field or the signature changes.
    pub fn id(&self) -> RecordId {
        let signature = self.signature.as_deref().unwrap_or("");
        RecordId(sha256_parts(&[&self.signable_bytes(), signature.as_bytes()]))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Verifies a record's signature against its embedded public key.
///
/// Unsigned records, unknown versions, and unparsable key or signature
/// fields all verify as `false`.
pub fn verify(record: &SignedRecord) -> bool {
    if record.version != RECORD_VERSION {
        return false;
    }
    let (Some(pk_hex), Some(sig_hex)) = (&record.public_key, &record.signature) else {
        return false;
    };
    let Ok(public_key) = DomainPublicKey::from_hex(pk_hex) else {
        return false;
    };
    let Some(signature) = hex::decode(sig_hex)
        .ok()
        .and_then(|b| DomainSignature::try_from_slice(&b).ok())
    else {
        return false;
    };
    public_key.verify(&record.signable_bytes(), &signature)
}

/// Verifies `record` and checks that it is bound to `anchor`.
pub fn verify_anchored(record: &SignedRecord, anchor: &SignedRecord) -> bool {
    verify(record) && record.anchor == Some(anchor.id())
}
