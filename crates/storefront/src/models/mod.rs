//! Types stored in the browser session.

pub mod session;

pub use session::{PendingCheckout, keys as session_keys};
