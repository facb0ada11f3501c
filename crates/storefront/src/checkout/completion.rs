//! Payment completion: callback handling and order reconciliation.
//!
//! A [`CheckoutSession`] walks a small state machine:
//!
//! ```text
//! Idle -> AwaitingResult -> Reconciling -> Success
//!              |                 |
//!              v                 v
//!      Failed(PaymentDeclined)  Failed(ReconciliationFailure | InvalidPrice | AmountMismatch)
//! ```
//!
//! The widget callback arrives over a `oneshot` channel. A dropped sender
//! means the attempt was abandoned and the session goes back to `Idle`.

use std::time::Duration;

use learnfront_core::{CurrencyCode, OrderId, OrderStatus, PaymentStatus, TxRef};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{NewOrder, OrderGateway};
use crate::config::CheckoutSettings;

use super::{BuyerInfo, CheckoutError, PaymentWidgetConfig, Product};

/// Where to send the buyer after a successful payment, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPlan {
    pub to: String,
    pub after: Duration,
}

/// Checkout session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPhase {
    Idle,
    AwaitingResult,
    Reconciling,
    Success(RedirectPlan),
    Failed(CheckoutError),
}

impl CheckoutPhase {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingResult => "awaiting_result",
            Self::Reconciling => "reconciling",
            Self::Success(_) => "success",
            Self::Failed(_) => "failed",
        }
    }
}

/// The attempt a session is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub tx_ref: TxRef,
    pub buyer: BuyerInfo,
}

/// One buyer's checkout of one product.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    product: Product,
    phase: CheckoutPhase,
    attempt: Option<PaymentAttempt>,
    history: Vec<CheckoutPhase>,
}

impl CheckoutSession {
    #[must_use]
    pub fn new(product: Product) -> Self {
        Self {
            product,
            phase: CheckoutPhase::Idle,
            attempt: None,
            history: vec![CheckoutPhase::Idle],
        }
    }

    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    #[must_use]
    pub const fn phase(&self) -> &CheckoutPhase {
        &self.phase
    }

    /// Every phase entered so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[CheckoutPhase] {
        &self.history
    }

    #[must_use]
    pub fn tx_ref(&self) -> Option<&TxRef> {
        self.attempt.as_ref().map(|a| &a.tx_ref)
    }

    #[must_use]
    pub const fn attempt(&self) -> Option<&PaymentAttempt> {
        self.attempt.as_ref()
    }

    /// Record that the widget was opened with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AttemptInProgress`] unless the session is idle.
    pub fn begin(&mut self, config: &PaymentWidgetConfig) -> Result<(), CheckoutError> {
        if self.phase != CheckoutPhase::Idle {
            return Err(CheckoutError::AttemptInProgress);
        }

        self.attempt = Some(PaymentAttempt {
            tx_ref: config.tx_ref.clone(),
            buyer: BuyerInfo {
                name: config.customer.name.clone(),
                email: config.customer.email.clone(),
                phone: config.customer.phone_number.clone(),
            },
        });
        self.transition(CheckoutPhase::AwaitingResult);
        Ok(())
    }

    /// Return to `Idle` after a retryable failure.
    ///
    /// # Errors
    ///
    /// Returns the failure itself when it is not retryable (the buyer has
    /// paid or the product cannot be sold), or
    /// [`CheckoutError::AttemptInProgress`] while an attempt is open.
    pub fn retry(&mut self) -> Result<(), CheckoutError> {
        match &self.phase {
            CheckoutPhase::Idle => Ok(()),
            CheckoutPhase::Failed(err) if err.is_retryable() => {
                self.attempt = None;
                self.transition(CheckoutPhase::Idle);
                Ok(())
            }
            CheckoutPhase::Failed(err) => Err(err.clone()),
            CheckoutPhase::AwaitingResult | CheckoutPhase::Reconciling | CheckoutPhase::Success(_) => {
                Err(CheckoutError::AttemptInProgress)
            }
        }
    }

    fn abandon(&mut self) {
        self.attempt = None;
        self.transition(CheckoutPhase::Idle);
    }

    fn fail(&mut self, err: CheckoutError) {
        self.transition(CheckoutPhase::Failed(err));
    }

    fn transition(&mut self, next: CheckoutPhase) {
        debug!(from = self.phase.name(), to = next.name(), "Checkout phase change");
        self.phase = next.clone();
        self.history.push(next);
    }
}

/// Callback payload relayed from the payment widget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WidgetResponse {
    pub status: String,
    pub tx_ref: String,
    /// Provider transaction id; the widget sends a number, some relays a string.
    #[serde(default)]
    pub transaction_id: Option<serde_json::Value>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl WidgetResponse {
    #[must_use]
    pub fn transaction_id(&self) -> Option<String> {
        match self.transaction_id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Describe what the provider echoed, when it disagrees with `product`.
    fn mismatch(&self, product: &Product) -> Option<String> {
        let expected = product.price;

        let amount_differs = self.amount.is_some_and(|amount| {
            Decimal::from_f64(amount).map(|d| d.round_dp(2)) != Some(expected.amount.round_dp(2))
        });
        let currency_differs = self.currency.as_deref().is_some_and(|currency| {
            CurrencyCode::parse(currency).ok() != Some(expected.currency_code)
        });

        (amount_differs || currency_differs).then(|| {
            format!(
                "{} {}",
                self.amount.map_or_else(|| "?".to_string(), |a| a.to_string()),
                self.currency.as_deref().unwrap_or("?")
            )
        })
    }
}

/// Turns widget callbacks into order records.
pub struct PaymentCompletionHandler<G> {
    orders: G,
    redirect: RedirectPlan,
}

impl<G: OrderGateway> PaymentCompletionHandler<G> {
    pub fn new(orders: G, settings: &CheckoutSettings) -> Self {
        Self {
            orders,
            redirect: RedirectPlan {
                to: settings.redirect_url.clone(),
                after: settings.redirect_delay,
            },
        }
    }

    #[must_use]
    pub const fn orders(&self) -> &G {
        &self.orders
    }

    /// Wait for the callback of the session's open attempt and reconcile it.
    ///
    /// Returns the phase the session ended in. Sessions that are not
    /// awaiting a result are left untouched.
    #[instrument(skip_all, fields(tx_ref = ?session.tx_ref().map(TxRef::as_str)))]
    pub async fn complete(
        &self,
        session: &mut CheckoutSession,
        callback: oneshot::Receiver<WidgetResponse>,
    ) -> CheckoutPhase {
        if session.phase != CheckoutPhase::AwaitingResult {
            warn!(phase = session.phase.name(), "Session is not awaiting a payment result");
            return session.phase.clone();
        }

        match callback.await {
            Ok(response) => self.reconcile(session, response).await,
            Err(_) => {
                info!("Payment attempt abandoned");
                session.abandon();
            }
        }

        session.phase.clone()
    }

    async fn reconcile(&self, session: &mut CheckoutSession, response: WidgetResponse) {
        let Some(attempt) = session.attempt.clone() else {
            return;
        };

        if response.tx_ref != attempt.tx_ref.as_str() {
            warn!(received = %response.tx_ref, "Callback for a different transaction");
            session.fail(CheckoutError::PaymentDeclined {
                status: "transaction reference mismatch".to_string(),
            });
            return;
        }

        if !PaymentStatus::from_widget(&response.status).is_success() {
            info!(status = %response.status, "Payment not completed");
            session.fail(CheckoutError::PaymentDeclined {
                status: response.status,
            });
            return;
        }

        session.transition(CheckoutPhase::Reconciling);

        let price = session.product.price;
        if let Err(e) = price.validate() {
            error!(error = %e, product_id = %session.product.id, "Refusing to record order with invalid price");
            session.fail(CheckoutError::InvalidPrice(e.to_string()));
            return;
        }

        let mismatch = response.mismatch(&session.product);
        let order = NewOrder {
            customer_name: attempt.buyer.name,
            customer_email: attempt.buyer.email,
            amount: price.amount,
            currency: price.currency_code,
            status: if mismatch.is_some() {
                OrderStatus::UnderReview
            } else {
                OrderStatus::Completed
            },
            product_id: session.product.id.clone(),
            tx_ref: attempt.tx_ref.as_str().to_string(),
            transaction_id: response.transaction_id(),
        };

        let receipt = match self.orders.record_order(&order).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let event_id = sentry::with_scope(
                    |scope| scope.set_tag("tx_ref", attempt.tx_ref.as_str()),
                    || sentry::capture_error(&e),
                );
                error!(error = %e, sentry_event_id = %event_id, "Paid order could not be recorded");
                session.fail(CheckoutError::ReconciliationFailure {
                    detail: e.to_string(),
                });
                return;
            }
        };
        let order_id = receipt.id.as_ref().map(OrderId::as_str);

        if let Some(reported) = mismatch {
            let event_id = sentry::with_scope(
                |scope| scope.set_tag("tx_ref", attempt.tx_ref.as_str()),
                || {
                    sentry::capture_message(
                        &format!("Payment amount mismatch: expected {price}, provider reported {reported}"),
                        sentry::Level::Warning,
                    )
                },
            );
            warn!(expected = %price, %reported, ?order_id, sentry_event_id = %event_id, "Order recorded for review");
            session.fail(CheckoutError::AmountMismatch {
                expected: price,
                reported,
            });
            return;
        }

        info!(amount = %price, ?order_id, "Order recorded");
        session.transition(CheckoutPhase::Success(self.redirect.clone()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use learnfront_core::Price;

    use super::*;
    use crate::backend::{BackendError, OrderReceipt};
    use crate::checkout::{CheckoutForm, EbookTier, ProductKind};
    use crate::config::PaymentWidgetSettings;

    /// Order gateway that records writes and can be told to fail.
    #[derive(Default)]
    pub(crate) struct FakeOrders {
        pub written: Mutex<Vec<NewOrder>>,
        pub fail: bool,
    }

    impl FakeOrders {
        pub(crate) fn written(&self) -> Vec<NewOrder> {
            self.written.lock().unwrap().clone()
        }
    }

    impl OrderGateway for FakeOrders {
        async fn record_order(&self, order: &NewOrder) -> Result<OrderReceipt, BackendError> {
            self.written.lock().unwrap().push(order.clone());
            if self.fail {
                return Err(BackendError::Api {
                    status: 500,
                    message: "database unavailable".to_string(),
                });
            }
            Ok(OrderReceipt {
                id: Some(OrderId::new("order-1")),
            })
        }
    }

    pub(crate) fn checkout_settings() -> CheckoutSettings {
        CheckoutSettings {
            redirect_url: "/".to_string(),
            redirect_delay: Duration::from_secs(5),
            attempt_ttl: Duration::from_secs(60),
            late_callback_window: Duration::from_secs(60),
        }
    }

    /// Session for `product` that has opened the widget.
    pub(crate) fn begun_session(product: Product) -> CheckoutSession {
        let mut form = CheckoutForm::new(product.clone());
        form.buyer_mut().set_name("Ada Lovelace");
        form.buyer_mut().set_email("ada@example.com");
        form.buyer_mut().set_phone("08012345678");
        let settings = PaymentWidgetSettings {
            public_key: "FLWPUBK_TEST-abc-X".to_string(),
            payment_options: "card".to_string(),
            logo_url: None,
        };
        let config = form.payment_config(&settings, Utc::now()).unwrap();

        let mut session = CheckoutSession::new(product);
        session.begin(&config).unwrap();
        session
    }

    fn response(session: &CheckoutSession, status: &str) -> WidgetResponse {
        WidgetResponse {
            status: status.to_string(),
            tx_ref: session.tx_ref().unwrap().as_str().to_string(),
            transaction_id: Some(serde_json::json!(4_418_273)),
            amount: None,
            currency: None,
        }
    }

    async fn run(
        handler: &PaymentCompletionHandler<FakeOrders>,
        session: &mut CheckoutSession,
        response: Option<WidgetResponse>,
    ) -> CheckoutPhase {
        let (tx, rx) = oneshot::channel();
        if let Some(response) = response {
            tx.send(response).unwrap();
        } else {
            drop(tx);
        }
        handler.complete(session, rx).await
    }

    fn phase_names(session: &CheckoutSession) -> Vec<&'static str> {
        session.history().iter().map(CheckoutPhase::name).collect()
    }

    #[tokio::test]
    async fn test_successful_payment_records_product_price() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Pro));
        let mut callback = response(&session, "successful");
        callback.amount = Some(49.99);
        callback.currency = Some("usd".to_string());

        let phase = run(&handler, &mut session, Some(callback)).await;

        assert_eq!(
            phase,
            CheckoutPhase::Success(RedirectPlan {
                to: "/".to_string(),
                after: Duration::from_secs(5)
            })
        );
        assert_eq!(
            phase_names(&session),
            ["idle", "awaiting_result", "reconciling", "success"]
        );

        let written = handler.orders().written();
        assert_eq!(written.len(), 1);
        let order = written.first().unwrap();
        assert_eq!(order.amount, Decimal::new(4999, 2));
        assert_eq!(order.currency, CurrencyCode::USD);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.customer_email, "ada@example.com");
        assert_eq!(order.transaction_id.as_deref(), Some("4418273"));
        assert_eq!(order.product_id, "ebook-pro");
    }

    #[tokio::test]
    async fn test_completed_status_is_success_too() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Basic));
        let callback = response(&session, "COMPLETED");
        let phase = run(&handler, &mut session, Some(callback)).await;
        assert_eq!(phase.name(), "success");
    }

    #[tokio::test]
    async fn test_failed_write_reports_reconciliation_failure_once() {
        let orders = FakeOrders {
            fail: true,
            ..FakeOrders::default()
        };
        let handler = PaymentCompletionHandler::new(orders, &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Pro));
        let callback = response(&session, "successful");

        let phase = run(&handler, &mut session, Some(callback)).await;

        let CheckoutPhase::Failed(err) = phase else {
            panic!("expected failure, got {phase:?}");
        };
        assert!(matches!(err, CheckoutError::ReconciliationFailure { .. }));
        assert!(err.needs_support());
        assert_eq!(handler.orders().written().len(), 1);
        assert_eq!(
            phase_names(&session),
            ["idle", "awaiting_result", "reconciling", "failed"]
        );
        assert_eq!(session.retry(), Err(err));
    }

    #[tokio::test]
    async fn test_declined_payment_writes_nothing_and_can_retry() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Premium));
        let callback = response(&session, "failed");

        let phase = run(&handler, &mut session, Some(callback)).await;

        assert_eq!(
            phase,
            CheckoutPhase::Failed(CheckoutError::PaymentDeclined {
                status: "failed".to_string()
            })
        );
        assert!(handler.orders().written().is_empty());
        assert!(session.retry().is_ok());
        assert_eq!(session.phase(), &CheckoutPhase::Idle);
        assert!(session.tx_ref().is_none());
    }

    #[tokio::test]
    async fn test_dropped_callback_returns_to_idle() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Pro));

        let phase = run(&handler, &mut session, None).await;

        assert_eq!(phase, CheckoutPhase::Idle);
        assert_eq!(phase_names(&session), ["idle", "awaiting_result", "idle"]);
        assert!(handler.orders().written().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_tx_ref_is_declined() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Pro));
        let mut callback = response(&session, "successful");
        callback.tx_ref = "tx-0-deadbeef".to_string();

        let phase = run(&handler, &mut session, Some(callback)).await;

        assert!(matches!(
            phase,
            CheckoutPhase::Failed(CheckoutError::PaymentDeclined { .. })
        ));
        assert!(handler.orders().written().is_empty());
    }

    #[tokio::test]
    async fn test_negative_price_never_reaches_persistence() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let product = Product {
            id: "broken".to_string(),
            title: "Broken".to_string(),
            price: Price::new(Decimal::new(-500, 2), CurrencyCode::USD),
            kind: ProductKind::Course {
                slug: "broken".to_string(),
            },
        };
        let mut session = begun_session(product);
        let callback = response(&session, "successful");

        let phase = run(&handler, &mut session, Some(callback)).await;

        assert!(matches!(
            phase,
            CheckoutPhase::Failed(CheckoutError::InvalidPrice(_))
        ));
        assert!(handler.orders().written().is_empty());
        assert!(session.retry().is_err());
    }

    #[tokio::test]
    async fn test_echoed_amount_mismatch_is_recorded_for_review() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = begun_session(Product::ebook(EbookTier::Pro));
        let mut callback = response(&session, "successful");
        callback.amount = Some(1.0);
        callback.currency = Some("USD".to_string());

        let phase = run(&handler, &mut session, Some(callback)).await;

        assert!(matches!(
            phase,
            CheckoutPhase::Failed(CheckoutError::AmountMismatch { .. })
        ));
        let written = handler.orders().written();
        let order = written.first().unwrap();
        assert_eq!(order.status, OrderStatus::UnderReview);
        assert_eq!(order.amount, Decimal::new(4999, 2));
    }

    #[tokio::test]
    async fn test_idle_session_is_not_completed() {
        let handler = PaymentCompletionHandler::new(FakeOrders::default(), &checkout_settings());
        let mut session = CheckoutSession::new(Product::ebook(EbookTier::Pro));
        let (_tx, rx) = oneshot::channel();

        let phase = handler.complete(&mut session, rx).await;

        assert_eq!(phase, CheckoutPhase::Idle);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_begin_twice_is_refused() {
        let mut session = begun_session(Product::ebook(EbookTier::Pro));
        let mut form = CheckoutForm::new(Product::ebook(EbookTier::Pro));
        form.buyer_mut().set_name("B");
        form.buyer_mut().set_email("b@example.com");
        form.buyer_mut().set_phone("1");
        let settings = PaymentWidgetSettings {
            public_key: "FLWPUBK_TEST-abc-X".to_string(),
            payment_options: "card".to_string(),
            logo_url: None,
        };
        let config = form.payment_config(&settings, Utc::now()).unwrap();
        assert_eq!(
            session.begin(&config),
            Err(CheckoutError::AttemptInProgress)
        );
    }

    #[test]
    fn test_transaction_id_forms() {
        let mut response = WidgetResponse {
            status: "successful".to_string(),
            tx_ref: "tx".to_string(),
            transaction_id: Some(serde_json::json!("  ")),
            amount: None,
            currency: None,
        };
        assert_eq!(response.transaction_id(), None);
        response.transaction_id = Some(serde_json::json!("FLW-123"));
        assert_eq!(response.transaction_id().as_deref(), Some("FLW-123"));
        response.transaction_id = None;
        assert_eq!(response.transaction_id(), None);
    }
}
