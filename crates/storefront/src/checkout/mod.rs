//! Checkout and order reconciliation.
//!
//! # Flow
//!
//! 1. [`product`] resolves a route slug to a [`Product`] (fixed ebook tier or
//!    catalog course). Unknown slugs resolve to `NotFound`, never an error.
//! 2. [`form`] collects [`BuyerInfo`] and, once every field is filled, builds
//!    the payment widget configuration.
//! 3. [`attempts`] parks a [`CheckoutSession`] until the widget's single
//!    callback arrives for its transaction reference.
//! 4. [`completion`] checks the callback, writes the order through the
//!    [`OrderGateway`](crate::backend::OrderGateway), and drives the session
//!    to `Success` or `Failed`.

pub mod attempts;
pub mod completion;
pub mod form;
pub mod product;

pub use attempts::PaymentAttempts;
pub use completion::{
    CheckoutPhase, CheckoutSession, PaymentCompletionHandler, RedirectPlan, WidgetResponse,
};
pub use form::{BuyerField, BuyerInfo, CheckoutForm, PaymentWidgetConfig};
pub use product::{EbookTier, NotFoundReason, Product, ProductKind, PurchaseTarget, Resolution};

use axum::http::StatusCode;
use learnfront_core::Price;
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;

/// Message shown when money moved but the order write failed.
pub const RECONCILIATION_FAILURE_MESSAGE: &str =
    "payment succeeded but order could not be recorded";

/// Everything that can end or block a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The slug does not name a purchasable product.
    #[error("product not found ({0})")]
    NotFound(NotFoundReason),

    /// Submission attempted before every buyer field was filled.
    #[error("missing buyer details: {}", format_fields(.missing))]
    ValidationIncomplete { missing: Vec<BuyerField> },

    /// The payment provider did not report success.
    #[error("payment was not completed (status: {status})")]
    PaymentDeclined { status: String },

    /// Payment succeeded, the order write did not.
    #[error("payment succeeded but order could not be recorded: {detail}")]
    ReconciliationFailure { detail: String },

    /// The backend could not be reached or did not answer usefully.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The product price is not a well-formed non-negative amount.
    #[error("invalid product price: {0}")]
    InvalidPrice(String),

    /// The provider charged something other than the product price.
    #[error("provider reported {reported}, expected {expected}")]
    AmountMismatch { expected: Price, reported: String },

    /// An earlier attempt from this browser is still waiting for its callback.
    #[error("a payment attempt is already in progress")]
    AttemptInProgress,

    /// No pending attempt has this transaction reference.
    #[error("unknown payment attempt: {0}")]
    UnknownAttempt(String),
}

impl From<BackendError> for CheckoutError {
    fn from(err: BackendError) -> Self {
        Self::NetworkFailure(err.to_string())
    }
}

fn format_fields(fields: &[BuyerField]) -> String {
    fields
        .iter()
        .map(BuyerField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CheckoutError {
    /// Whether the buyer may start a fresh attempt for the same product.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ValidationIncomplete { .. }
                | Self::PaymentDeclined { .. }
                | Self::NetworkFailure(_)
                | Self::AttemptInProgress
        )
    }

    /// Whether the buyer has paid and must contact support.
    #[must_use]
    pub const fn needs_support(&self) -> bool {
        matches!(
            self,
            Self::ReconciliationFailure { .. } | Self::AmountMismatch { .. }
        )
    }

    /// HTTP status used when this error ends a request.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::UnknownAttempt(_) => StatusCode::NOT_FOUND,
            Self::ValidationIncomplete { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::AttemptInProgress => StatusCode::CONFLICT,
            Self::NetworkFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ReconciliationFailure { .. } | Self::InvalidPrice(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::AmountMismatch { .. } => StatusCode::CONFLICT,
        }
    }

    /// User-facing notification. Never includes backend details.
    #[must_use]
    pub fn notification(&self) -> Notification {
        match self {
            Self::NotFound(NotFoundReason::LookupFailed) => Notification::error(
                "Product unavailable",
                "We couldn't load this product right now. Please try again.",
            ),
            Self::NotFound(_) => Notification::error(
                "Product not found",
                "This product doesn't exist or is no longer for sale.",
            ),
            Self::ValidationIncomplete { missing } => Notification::error(
                "Missing details",
                format!("Please fill in: {}.", format_fields(missing)),
            ),
            Self::PaymentDeclined { .. } => Notification::error(
                "Payment failed",
                "Your payment was not completed. Please try again.",
            ),
            Self::ReconciliationFailure { .. } => Notification::error(
                "Order not recorded",
                "Your payment succeeded but we could not record your order. \
                 Please contact support with your transaction reference.",
            ),
            Self::NetworkFailure(_) => Notification::error(
                "Connection problem",
                "We couldn't reach our servers. Please try again.",
            ),
            Self::InvalidPrice(_) => Notification::error(
                "Invalid price",
                "This product has an invalid price and can't be purchased.",
            ),
            Self::AmountMismatch { .. } => Notification::error(
                "Payment under review",
                "The amount charged doesn't match this product. Your order is under \
                 review; please contact support with your transaction reference.",
            ),
            Self::AttemptInProgress => Notification::error(
                "Payment in progress",
                "Finish or close the open payment window before starting another.",
            ),
            Self::UnknownAttempt(_) => Notification::error(
                "Payment session expired",
                "This payment session is no longer active. Please start again.",
            ),
        }
    }
}

/// Notification style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Success,
    Destructive,
}

impl NotificationVariant {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Destructive => "destructive",
        }
    }
}

/// Transient message shown to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    #[must_use]
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Success,
        }
    }

    #[must_use]
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }

    /// Whether this notification reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }
}

#[cfg(test)]
mod tests {
    use learnfront_core::CurrencyCode;
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_support_errors_are_not_retryable() {
        let reconciliation = CheckoutError::ReconciliationFailure {
            detail: "HTTP 500".to_string(),
        };
        let mismatch = CheckoutError::AmountMismatch {
            expected: Price::new(Decimal::new(4999, 2), CurrencyCode::USD),
            reported: "10 USD".to_string(),
        };

        for err in [&reconciliation, &mismatch] {
            assert!(err.needs_support());
            assert!(!err.is_retryable());
        }
        assert!(
            CheckoutError::PaymentDeclined {
                status: "failed".to_string()
            }
            .is_retryable()
        );
        assert!(!CheckoutError::InvalidPrice("-1".to_string()).is_retryable());
    }

    #[test]
    fn test_reconciliation_message_is_distinct() {
        let err = CheckoutError::ReconciliationFailure {
            detail: "timeout".to_string(),
        };
        assert!(err.to_string().starts_with(RECONCILIATION_FAILURE_MESSAGE));
        assert!(!err.notification().description.contains("timeout"));
    }

    #[test]
    fn test_validation_lists_missing_fields() {
        let err = CheckoutError::ValidationIncomplete {
            missing: vec![BuyerField::Email, BuyerField::Phone],
        };
        assert_eq!(err.to_string(), "missing buyer details: email, phone");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.notification().is_error());
    }

    #[test]
    fn test_backend_errors_are_network_failures() {
        let err = CheckoutError::from(BackendError::Timeout);
        assert!(matches!(err, CheckoutError::NetworkFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(err.notification().title, "Connection problem");
        assert!(!err.notification().description.contains("timed out"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CheckoutError::NotFound(NotFoundReason::Missing).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CheckoutError::AttemptInProgress.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CheckoutError::NetworkFailure("timeout".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
