//! Per-domain exchange settings: who this node signs as, whom it forwards
//! to, and what inventory it can bid with.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DEFAULT_SUPPLIER_SCHEME, DEFAULT_SUPPLIER_TIMEOUT_MS};
use crate::payload::Bid;

/// Problems found while validating a [`DomainConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("unsupported supplier scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("supplier '{0}' is listed more than once")]
    DuplicateSupplier(String),

    #[error("supplier '{0}' is this domain itself")]
    SelfSupplier(String),

    #[error("supplier_timeout_ms must be greater than zero")]
    ZeroTimeout,

    #[error("advert #{0} has an empty advertiser_url or media_url")]
    IncompleteAdvert(usize),
}

/// One entry of a domain's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advert {
    pub advertiser_url: String,
    pub media_url: String,
}

impl Advert {
    pub fn new(advertiser_url: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            advertiser_url: advertiser_url.into(),
            media_url: media_url.into(),
        }
    }

    /// The Bid payload proposing this advert.
    pub fn to_bid(&self) -> Bid {
        Bid {
            advertiser_url: self.advertiser_url.clone(),
            media_url: self.media_url.clone(),
        }
    }
}

fn default_scheme() -> String {
    DEFAULT_SUPPLIER_SCHEME.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SUPPLIER_TIMEOUT_MS
}

fn default_verify() -> bool {
    true
}

/// How one domain takes part in auctions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name this node signs records as.
    pub host: String,

    /// Rewrites the Offer's publisher domain before forwarding. Exists only
    /// to show that the audit trail catches it.
    #[serde(default)]
    pub bad_actor: bool,

    /// `http` or `https`, used to reach every supplier.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Downstream processors, `host[:port]`, in dispatch order.
    #[serde(default)]
    pub suppliers: Vec<String>,

    /// Inventory this domain can bid with.
    #[serde(default)]
    pub adverts: Vec<Advert>,

    /// Deadline for a single supplier dispatch.
    #[serde(default = "default_timeout_ms")]
    pub supplier_timeout_ms: u64,

    /// Reject supplier responses whose root record does not verify.
    #[serde(default = "default_verify")]
    pub verify_responses: bool,
}

impl DomainConfig {
    /// A domain with no suppliers and no inventory.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            bad_actor: false,
            scheme: default_scheme(),
            suppliers: Vec::new(),
            adverts: Vec::new(),
            supplier_timeout_ms: default_timeout_ms(),
            verify_responses: default_verify(),
        }
    }

    pub fn with_suppliers<I, S>(mut self, suppliers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suppliers = suppliers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_adverts(mut self, adverts: Vec<Advert>) -> Self {
        self.adverts = adverts;
        self
    }

    pub fn supplier_timeout(&self) -> Duration {
        Duration::from_millis(self.supplier_timeout_ms)
    }

    /// Checks the settings for mistakes that would only surface mid-auction.
    pub fn validate(&self) -> Result<(), DomainConfigError> {
        if self.host.trim().is_empty() {
            return Err(DomainConfigError::EmptyHost);
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(DomainConfigError::UnsupportedScheme(self.scheme.clone()));
        }
        if self.supplier_timeout_ms == 0 {
            return Err(DomainConfigError::ZeroTimeout);
        }

        let mut seen = HashSet::new();
        for supplier in &self.suppliers {
            if !seen.insert(supplier.as_str()) {
                return Err(DomainConfigError::DuplicateSupplier(supplier.clone()));
            }
            if supplier.eq_ignore_ascii_case(&self.host) {
                return Err(DomainConfigError::SelfSupplier(supplier.clone()));
            }
        }

        for (i, advert) in self.adverts.iter().enumerate() {
            if advert.advertiser_url.trim().is_empty() || advert.media_url.trim().is_empty() {
                return Err(DomainConfigError::IncompleteAdvert(i));
            }
        }
        Ok(())
    }
}
