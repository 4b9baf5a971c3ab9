//! # Domain Signing Keys
//!
//! Every organization that takes part in an auction signs its contribution
//! with an Ed25519 key. This module wraps `ed25519-dalek` into the three
//! types the rest of the crate talks about: a [`DomainKeypair`] held by the
//! signer, the [`DomainPublicKey`] that travels inside each record, and the
//! [`DomainSignature`] over a record's signable bytes.
//!
//! Key bytes are never logged. The `Debug` impl of the keypair prints only
//! the public half.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while parsing key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 bytes of hex")]
    InvalidSecretKey,

    #[error("invalid public key: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature: expected 64 bytes")]
    InvalidSignature,
}

/// The signing keypair of one exchange domain.
///
/// Not `Serialize`. Export goes through [`DomainKeypair::secret_key_hex`].
pub struct DomainKeypair {
    signing_key: SigningKey,
}

/// The public half of a domain keypair. Embedded in every signed record so
/// that any auditor can verify it without a key lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DomainSignature {
    bytes: [u8; 64],
}

impl DomainKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair deterministically from a 32-byte seed. Tests and
    /// demo fixtures use this to get stable keys.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Loads a keypair from a hex-encoded 32-byte seed, as written by
    /// `swan-node init`.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public key for this keypair.
    pub fn public_key(&self) -> DomainPublicKey {
        DomainPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Signs a message. Ed25519 is deterministic: the same key and message
    /// always produce the same signature.
    pub fn sign(&self, message: &[u8]) -> DomainSignature {
        DomainSignature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Exports the secret seed as hex. Handle with care.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Clone for DomainKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for DomainKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainKeypair")
            .field("public_key", &self.public_key().to_hex())
            .finish_non_exhaustive()
    }
}

impl DomainPublicKey {
    /// Parses a public key, rejecting byte strings that are not valid points.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verifies `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &DomainSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify_strict(message, &sig).is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for DomainPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for DomainPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainPublicKey({}…)", &self.to_hex()[..16])
    }
}

impl DomainSignature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 64] = slice.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self { bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for DomainSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainSignature({}…)", &self.to_hex()[..16])
    }
}
