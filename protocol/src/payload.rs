//! # Payload Variants
//!
//! A record's payload bytes decode into one of four shapes:
//!
//! | Variant  | Produced by                    | Meaning                                |
//! |----------|--------------------------------|----------------------------------------|
//! | `Offer`  | the publisher, at the root     | what is being auctioned, and for whom |
//! | `Bid`    | a processor with inventory     | the advert it proposes                 |
//! | `Empty`  | a processor without a bid      | explicit "no bid"                      |
//! | `Failed` | the caller of a dead supplier  | who failed and why                     |
//!
//! Payloads are JSON objects tagged by a `kind` field. The encoding is the
//! only thing that ever gets signed; how a payload is interpreted is the
//! reader's business.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::record::SignedRecord;

/// Errors decoding or encoding a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not a recognized variant: {0}")]
    Unrecognized(#[from] serde_json::Error),

    #[error("expected {expected} payload, found {found}")]
    UnexpectedVariant {
        expected: &'static str,
        found: &'static str,
    },
}

/// Root payload that starts an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Domain of the publisher page the advert will appear on.
    pub pub_domain: String,
    /// Placement identifier on that page.
    pub placement: String,
    /// Common browser identifier reference (an opaque signed token).
    #[serde(default)]
    pub cbid: Option<String>,
    /// Signed-in identifier reference.
    #[serde(default)]
    pub sid: Option<String>,
    /// Consent preferences reference.
    #[serde(default)]
    pub preferences: Option<String>,
    /// One-time value making every Offer unique for all time.
    pub nonce: Uuid,
    /// Advertiser domains the user has asked not to see.
    #[serde(default)]
    pub stopped: Vec<String>,
}

impl Offer {
    /// Creates an Offer with a fresh nonce and no identity references.
    pub fn new(pub_domain: impl Into<String>, placement: impl Into<String>) -> Self {
        Self {
            pub_domain: pub_domain.into(),
            placement: placement.into(),
            cbid: None,
            sid: None,
            preferences: None,
            nonce: Uuid::new_v4(),
            stopped: Vec::new(),
        }
    }

    /// Parses a whitespace-separated stop list, dropping empty entries.
    pub fn parse_stopped(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(|s| s.to_string()).collect()
    }

    /// Returns `true` if `advertiser` is on the stop list. Entries and the
    /// advertiser are compared by host, case-insensitively, so a stopped
    /// `adv-x.com` also stops `https://adv-x.com/landing`.
    pub fn is_stopped(&self, advertiser: &str) -> bool {
        let host = advertiser_host(advertiser);
        self.stopped
            .iter()
            .any(|s| advertiser_host(s).eq_ignore_ascii_case(host))
    }
}

/// Strips scheme, path and port from an advertiser reference.
fn advertiser_host(s: &str) -> &str {
    let s = s.trim();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .or_else(|| s.strip_prefix("//"))
        .unwrap_or(s);
    let end = s.find(['/', '?', '#']).unwrap_or(s.len());
    let authority = &s[..end];
    match authority.rfind(':') {
        Some(i) => &authority[..i],
        None => authority,
    }
}

/// An advert offered by a processor that has inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Where a click on the advert goes.
    pub advertiser_url: String,
    /// The creative to display.
    pub media_url: String,
}

/// A downstream call that did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failed {
    /// Supplier host that was called.
    pub host: String,
    /// HTTP status code, `timeout`, or transport error text.
    pub error: String,
}

/// A decoded record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Offer(Offer),
    Bid(Bid),
    Empty,
    Failed(Failed),
}

impl Payload {
    /// Decodes payload bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decodes the payload carried by `record`.
    pub fn resolve(record: &SignedRecord) -> Result<Self, PayloadError> {
        Self::from_bytes(&record.payload)
    }

    /// Encodes this payload into the bytes that get signed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Short variant name, used in logs and audit reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Offer(_) => "offer",
            Payload::Bid(_) => "bid",
            Payload::Empty => "empty",
            Payload::Failed(_) => "failed",
        }
    }

    /// Decodes `record` and insists on an Offer.
    pub fn offer(record: &SignedRecord) -> Result<Offer, PayloadError> {
        match Self::resolve(record)? {
            Payload::Offer(o) => Ok(o),
            other => Err(PayloadError::UnexpectedVariant {
                expected: "offer",
                found: other.kind(),
            }),
        }
    }

    pub fn is_bid(&self) -> bool {
        matches!(self, Payload::Bid(_))
    }
}
