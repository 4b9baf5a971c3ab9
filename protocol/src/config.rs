//! # Protocol Configuration & Constants
//!
//! Every magic number in SWAN lives here. The exchange is a chain of
//! independent organizations, so anything that two of them have to agree on
//! (paths, record versions, size ceilings) must be defined in one place and
//! nowhere else.
//!
//! Per-domain settings (suppliers, inventory, signing key) are not constants;
//! they live in [`crate::exchange::DomainConfig`].

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version byte written into every [`crate::record::SignedRecord`]. Bump when
/// the signable byte layout changes; verifiers reject versions they do not
/// know rather than guessing at the layout.
pub const RECORD_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Wire Contract
// ---------------------------------------------------------------------------

/// Path every processor serves and every supplier is called on.
pub const TRANSACTION_PATH: &str = "/transaction";

/// Content type of an encoded transaction tree.
pub const TREE_CONTENT_TYPE: &str = "application/json";

/// Default scheme used to reach suppliers when a domain does not set one.
pub const DEFAULT_SUPPLIER_SCHEME: &str = "https";

/// Maximum accepted size of an encoded tree in a request or supplier
/// response. A full auction tree with a few dozen participants is a few tens
/// of kilobytes; anything near this ceiling is abuse.
pub const MAX_TRANSACTION_BYTES: usize = 2 * 1024 * 1024;

/// Maximum number of nodes a decoded tree may contain.
pub const MAX_TREE_NODES: usize = 4_096;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Deadline applied to each supplier dispatch. A supplier that has not
/// answered by then is recorded as a `Failed` branch.
pub const DEFAULT_SUPPLIER_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Same deadline in milliseconds, for config files and serde defaults.
/// Keep this in sync with [`DEFAULT_SUPPLIER_TIMEOUT`].
pub const DEFAULT_SUPPLIER_TIMEOUT_MS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Auction Behavior
// ---------------------------------------------------------------------------

/// Publisher domain a bad-actor processor rewrites into the Offer. Exists so
/// the audit trail can demonstrate catching semantic fraud.
pub const BAD_ACTOR_PUB_DOMAIN: &str = "high-value-pub.com";

/// Error text recorded in a `Failed` node when the supplier did not answer
/// before the deadline.
pub const FAILED_TIMEOUT: &str = "timeout";

/// Error text recorded when a supplier answered 200 with a body that is not
/// a valid tree.
pub const FAILED_CORRUPT_RESPONSE: &str = "corrupt response";

/// Error text recorded when the returned subtree's root record does not
/// verify.
pub const FAILED_UNVERIFIED_RESPONSE: &str = "unverified response";

/// Error text recorded when a supplier's answer is over the body limit or
/// would push the merged tree past [`MAX_TREE_NODES`].
pub const FAILED_OVERSIZED_RESPONSE: &str = "response too large";
