//! In-flight payment attempts, keyed by transaction reference.
//!
//! Each attempt owns the producer half of its callback channel. The
//! completion handler runs on its own task and parks on the consumer half
//! until [`PaymentAttempts::deliver`] sends the widget response, the attempt
//! leaves the late window, or the registry shuts down. Dropping the producer
//! is how abandonment reaches the handler.
//!
//! An attempt stops blocking its browser once its TTL passes, but it stays
//! reachable for the late window: USSD and bank-transfer payments can settle
//! long after the widget was opened, and the money has moved by then.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use learnfront_core::{PaymentStatus, TxRef};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::OrderGateway;

use super::{
    CheckoutError, CheckoutPhase, CheckoutSession, PaymentCompletionHandler, WidgetResponse,
};

/// How long a successful callback for an expired attempt is still recorded.
pub const DEFAULT_LATE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

struct PendingAttempt {
    callback: oneshot::Sender<WidgetResponse>,
    outcome: oneshot::Receiver<CheckoutPhase>,
}

/// Cache slot. Taking the attempt out makes delivery happen at most once
/// even if the cache still hands out clones of the slot. A taken slot stays
/// cached so a repeated callback is recognised as a duplicate.
#[derive(Clone)]
struct PendingSlot(Arc<Mutex<Option<PendingAttempt>>>);

impl PendingSlot {
    fn new(attempt: PendingAttempt) -> Self {
        Self(Arc::new(Mutex::new(Some(attempt))))
    }

    fn take(&self) -> Option<PendingAttempt> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn is_open(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// Registry of payment attempts waiting for their callback.
#[derive(Clone)]
pub struct PaymentAttempts {
    pending: Cache<String, PendingSlot>,
    expired: Cache<String, PendingSlot>,
    /// Browser session id to the transaction reference it last opened.
    owners: Cache<String, String>,
    ttl: Duration,
}

impl PaymentAttempts {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_late_window(ttl, DEFAULT_LATE_WINDOW)
    }

    #[must_use]
    pub fn with_late_window(ttl: Duration, late_window: Duration) -> Self {
        // The per-attempt timer moves slots out of `pending`. Its TTL is only
        // a backstop and must outlive the timer, or the timer finds nothing.
        let pending = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl.saturating_mul(2))
            .build();
        let expired = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(late_window)
            .build();
        let owners = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl.saturating_mul(2))
            .build();
        Self {
            pending,
            expired,
            owners,
            ttl,
        }
    }

    /// Park `session` until its callback arrives.
    ///
    /// With an `owner` (the browser's session id), registration is atomic
    /// per owner: at most one attempt per browser is pending at a time.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownAttempt`] if the session has not begun
    /// an attempt, or [`CheckoutError::AttemptInProgress`] if its transaction
    /// reference is already registered or the owner has a pending attempt.
    #[instrument(skip_all, fields(tx_ref = ?session.tx_ref().map(TxRef::as_str)))]
    pub async fn start<G>(
        &self,
        handler: Arc<PaymentCompletionHandler<G>>,
        mut session: CheckoutSession,
        owner: Option<&str>,
    ) -> Result<TxRef, CheckoutError>
    where
        G: OrderGateway + 'static,
    {
        let tx_ref = match (session.phase(), session.tx_ref()) {
            (CheckoutPhase::AwaitingResult, Some(tx_ref)) => tx_ref.clone(),
            _ => {
                return Err(CheckoutError::UnknownAttempt(
                    "session has no open attempt".to_string(),
                ));
            }
        };
        let key = tx_ref.as_str().to_string();
        if self.pending.contains_key(&key) || self.expired.contains_key(&key) {
            return Err(CheckoutError::AttemptInProgress);
        }

        let (callback_tx, callback_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let slot = PendingSlot::new(PendingAttempt {
            callback: callback_tx,
            outcome: outcome_rx,
        });

        match owner {
            Some(owner) => self.register_for_owner(owner, &key, &slot).await?,
            None => self.pending.insert(key.clone(), slot).await,
        }

        tokio::spawn(async move {
            let phase = handler.complete(&mut session, callback_rx).await;
            // Nobody listens when the slot was dropped.
            let _ = outcome_tx.send(phase);
        });

        let pending = self.pending.clone();
        let expired = self.expired.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            // Insert before removing so a concurrent callback always finds the slot.
            if let Some(slot) = pending.get(&key).await {
                let open = slot.is_open();
                expired.insert(key.clone(), slot).await;
                pending.remove(&key).await;
                if open {
                    info!(tx_ref = %key, "Payment attempt expired");
                }
            }
        });

        debug!("Payment attempt registered");
        Ok(tx_ref)
    }

    async fn register_for_owner(
        &self,
        owner: &str,
        key: &str,
        slot: &PendingSlot,
    ) -> Result<(), CheckoutError> {
        // Runs under moka's per-key lock, so check-and-insert is atomic per owner.
        let result = self
            .owners
            .entry_by_ref(owner)
            .and_compute_with(move |current| async move {
                if let Some(current) = current
                    && self.is_pending(current.value()).await
                {
                    return Op::Nop;
                }
                self.pending.insert(key.to_string(), slot.clone()).await;
                Op::Put(key.to_string())
            })
            .await;

        match result {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => Ok(()),
            _ => {
                debug!("Browser already has a pending payment attempt");
                Err(CheckoutError::AttemptInProgress)
            }
        }
    }

    /// Hand the widget's callback to its waiting attempt and wait for the result.
    ///
    /// A successful callback for an expired attempt is still reconciled while
    /// the attempt is within its late window.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownAttempt`] if no attempt is waiting on
    /// this reference (never started, expired, or already delivered). A
    /// successful payment that matches no attempt at all is reported to
    /// Sentry and returned as [`CheckoutError::ReconciliationFailure`].
    #[instrument(skip_all, fields(tx_ref = %response.tx_ref, status = %response.status))]
    pub async fn deliver(&self, response: WidgetResponse) -> Result<CheckoutPhase, CheckoutError> {
        let tx_ref = response.tx_ref.clone();
        let unknown = || CheckoutError::UnknownAttempt(response.tx_ref.clone());
        let paid = PaymentStatus::from_widget(&response.status).is_success();

        let attempt = if let Some(slot) = self.pending.get(&tx_ref).await {
            slot.take().ok_or_else(unknown)?
        } else if let Some(slot) = self.expired.get(&tx_ref).await {
            let attempt = slot.take().ok_or_else(unknown)?;
            if !paid {
                // Dropping the attempt releases its handler.
                info!("Expired payment attempt closed without payment");
                return Err(unknown());
            }
            warn!("Reconciling a payment whose attempt had expired");
            attempt
        } else if paid {
            return Err(unmatched_payment(&response));
        } else {
            return Err(unknown());
        };

        if attempt.callback.send(response).is_err() {
            warn!("Completion task ended before the callback arrived");
            return Err(CheckoutError::UnknownAttempt(tx_ref));
        }

        attempt.outcome.await.map_err(|_| {
            warn!("Completion task ended without reporting an outcome");
            CheckoutError::ReconciliationFailure {
                detail: "completion task ended unexpectedly".to_string(),
            }
        })
    }

    /// Whether an attempt is waiting on `tx_ref` within its TTL.
    pub async fn is_pending(&self, tx_ref: &str) -> bool {
        self.pending
            .get(tx_ref)
            .await
            .is_some_and(|slot| slot.is_open())
    }

    /// Drop every pending and expired attempt. Their handlers observe abandonment.
    pub async fn shutdown(&self) {
        let mut dropped = 0_usize;
        for (_, slot) in self.pending.iter().chain(self.expired.iter()) {
            if slot.take().is_some() {
                dropped += 1;
            }
        }
        self.pending.invalidate_all();
        self.expired.invalidate_all();
        self.owners.invalidate_all();
        self.pending.run_pending_tasks().await;
        self.expired.run_pending_tasks().await;
        info!(dropped, "Pending payment attempts dropped");
    }
}

/// A provider reported success for a reference nobody is waiting on.
fn unmatched_payment(response: &WidgetResponse) -> CheckoutError {
    let event_id = sentry::with_scope(
        |scope| scope.set_tag("tx_ref", &response.tx_ref),
        || {
            sentry::capture_message(
                &format!(
                    "Successful payment with no matching attempt (status: {})",
                    response.status
                ),
                sentry::Level::Error,
            )
        },
    );
    error!(
        transaction_id = ?response.transaction_id(),
        sentry_event_id = %event_id,
        "Paid order matches no payment attempt"
    );
    CheckoutError::ReconciliationFailure {
        detail: "no payment attempt matches this transaction reference".to_string(),
    }
}
