//! External course/order backend.
//!
//! # Architecture
//!
//! - The backend is the source of truth for courses and orders; nothing is
//!   stored locally
//! - Catalog reads are cached in-memory via `moka` (TTL from config)
//! - Writes (create/update/delete) invalidate the catalog cache
//! - No automatic retries; every call has an explicit timeout
//!
//! The checkout workflow only sees the [`CatalogGateway`] and [`OrderGateway`]
//! traits so it can be driven by in-memory fakes in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use learnfront_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend)?;
//! let course = client.course_by_slug("intro-to-rust").await?;
//! ```

mod cache;
mod client;
pub mod types;

use std::future::Future;

pub use client::BackendClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded the configured timeout.
    #[error("Backend request timed out")]
    Timeout,

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload rejected before sending.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Endpoint URL could not be built from the configured base.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// Whether the failure is on the network path rather than in the data.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout)
    }
}

/// Read access to course records.
pub trait CatalogGateway: Send + Sync {
    /// Look up a course by slug. `Ok(None)` when the backend has no such course.
    fn course_by_slug(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<CourseRecord>, BackendError>> + Send;

    /// List every course.
    fn list_courses(&self) -> impl Future<Output = Result<Vec<CourseRecord>, BackendError>> + Send;
}

/// Write access for completed orders.
pub trait OrderGateway: Send + Sync {
    /// Persist an order. There is no update or delete.
    fn record_order(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<OrderReceipt, BackendError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_classification() {
        assert!(BackendError::Timeout.is_network());
        assert!(
            !BackendError::Api {
                status: 500,
                message: "boom".to_string()
            }
            .is_network()
        );
        assert!(!BackendError::NotFound("x".to_string()).is_network());
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Api {
            status: 422,
            message: "slug taken".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 422 - slug taken");
    }
}
