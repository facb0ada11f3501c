//! Session-related types.

use serde::{Deserialize, Serialize};

/// The checkout attempt this browser opened last.
///
/// Only the reference is kept; the attempt itself lives in the server-side
/// registry until its callback arrives or it expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub tx_ref: String,
    pub slug: String,
}

/// Session keys.
pub mod keys {
    /// Key for the open checkout attempt.
    pub const PENDING_CHECKOUT: &str = "pending_checkout";
}
