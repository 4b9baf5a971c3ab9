//! Record creation and signing.
//!
//! The engine never touches key material directly; it asks a
//! [`RecordSigner`] for a record and then asks it to sign that record against
//! an anchor. [`DomainSigner`] is the Ed25519 implementation used by the node
//! binary and the tests. [`SignerRegistry`] answers "may this domain sign?".

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::signed::{RecordId, SignedRecord};
use crate::crypto::DomainKeypair;

/// Errors raised by the signing collaborator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// No signer is registered for the domain.
    #[error("no signer registered for domain '{0}'")]
    SignerMissing(String),

    /// The record already carries a signature. Records are immutable once
    /// signed; binding one twice would rewrite its identity.
    #[error("record from '{0}' is already signed")]
    AlreadySigned(String),

    /// The record was created for a different domain than the signer's.
    #[error("signer for '{signer}' cannot sign a record created by '{record}'")]
    DomainMismatch { signer: String, record: String },
}

/// The signing capability of one domain.
///
/// Implementations must be usable concurrently from several fan-out tasks;
/// signing is local and touches only the record passed in.
pub trait RecordSigner: Send + Sync {
    /// The domain this signer signs for.
    fn domain(&self) -> &str;

    /// Creates an unsigned record carrying `payload`.
    fn create_record(&self, payload: Vec<u8>) -> SignedRecord;

    /// Binds `record` to `anchor` and signs it. The anchor is written into
    /// the record before the signature is computed.
    fn sign(&self, record: &mut SignedRecord, anchor: Option<RecordId>) -> Result<(), RecordError>;

    /// Creates and signs a record in one step.
    fn create_signed(
        &self,
        payload: Vec<u8>,
        anchor: Option<RecordId>,
    ) -> Result<SignedRecord, RecordError> {
        let mut record = self.create_record(payload);
        self.sign(&mut record, anchor)?;
        Ok(record)
    }
}

/// Ed25519 signer for one domain.
#[derive(Debug, Clone)]
pub struct DomainSigner {
    domain: String,
    keypair: DomainKeypair,
}

impl DomainSigner {
    pub fn new(domain: impl Into<String>, keypair: DomainKeypair) -> Self {
        Self {
            domain: domain.into(),
            keypair,
        }
    }

    pub fn keypair(&self) -> &DomainKeypair {
        &self.keypair
    }
}

impl RecordSigner for DomainSigner {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn create_record(&self, payload: Vec<u8>) -> SignedRecord {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        SignedRecord::new(self.domain.clone(), payload, now)
    }

    fn sign(&self, record: &mut SignedRecord, anchor: Option<RecordId>) -> Result<(), RecordError> {
        if record.is_signed() {
            return Err(RecordError::AlreadySigned(record.domain.clone()));
        }
        if record.domain != self.domain {
            return Err(RecordError::DomainMismatch {
                signer: self.domain.clone(),
                record: record.domain.clone(),
            });
        }
        record.anchor = anchor;
        record.public_key = Some(self.keypair.public_key().to_hex());
        let signature = self.keypair.sign(&record.signable_bytes());
        record.signature = Some(signature.to_hex());
        Ok(())
    }
}

/// Domain → signer lookup. Built once at startup and shared read-only.
#[derive(Default, Clone)]
pub struct SignerRegistry {
    signers: HashMap<String, Arc<dyn RecordSigner>>,
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a signer under its own domain, replacing any previous one.
    pub fn register(&mut self, signer: Arc<dyn RecordSigner>) {
        self.signers.insert(signer.domain().to_string(), signer);
    }

    /// Returns the signer for `domain`, or [`RecordError::SignerMissing`].
    pub fn get(&self, domain: &str) -> Result<Arc<dyn RecordSigner>, RecordError> {
        self.signers
            .get(domain)
            .cloned()
            .ok_or_else(|| RecordError::SignerMissing(domain.to_string()))
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

impl std::fmt::Debug for SignerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerRegistry")
            .field("domains", &self.signers.keys().collect::<Vec<_>>())
            .finish()
    }
}
