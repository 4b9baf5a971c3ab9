//! # Exchange Engine
//!
//! Everything a domain does with a transaction once it arrives: extend it,
//! forward it, merge what comes back, and pick a winner.
//!
//! ```text
//! domain.rs   : DomainConfig: host, suppliers, inventory, timeouts
//! processor.rs: TransactionProcessor: the per-domain step function
//! fanout.rs   : SupplierFanout: concurrent dispatch + ordered merge
//! transport.rs: SupplierTransport trait, reqwest-backed HttpTransport
//! winner.rs   : choose / resolve_path over the finished tree
//! ```

pub mod domain;
pub mod fanout;
pub mod processor;
pub mod transport;
pub mod winner;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{Advert, DomainConfig, DomainConfigError};
pub use fanout::{failed_record, DispatchOutcome, FanoutReport, SupplierFanout};
pub use processor::{AuctionOutcome, ProcessOutcome, TransactionProcessor};
pub use transport::{HttpTransport, SupplierTransport};
pub use winner::{choose, is_eligible, resolve_path, winning_bid, winning_path};
