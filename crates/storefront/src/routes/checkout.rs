//! Checkout route handlers.
//!
//! The page collects buyer details; every keystroke posts the fields back
//! (HTMX) and gets a re-rendered pay button, disabled until all three are
//! filled. Paying registers an attempt server-side and returns the widget
//! configuration. The browser relays the widget's callback to
//! `/checkout/callback`, which answers with the final outcome as JSON.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use crate::checkout::{
    BuyerField, BuyerInfo, CheckoutError, CheckoutForm, CheckoutPhase, CheckoutSession,
    Notification, Product, ProductKind, Resolution, WidgetResponse, product,
};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::models::{PendingCheckout, session_keys};
use crate::state::AppState;

use super::{NotificationTemplate, not_found_page};

/// Product summary for the checkout page.
#[derive(Clone)]
pub struct ProductView {
    pub slug: String,
    pub title: String,
    pub price: String,
    pub back_href: String,
}

impl ProductView {
    fn new(slug: &str, product: &Product) -> Self {
        let back_href = match &product.kind {
            ProductKind::Course { slug } => format!("/courses/{slug}"),
            ProductKind::Ebook { .. } => "/courses".to_string(),
        };
        Self {
            slug: slug.to_string(),
            title: product.title.clone(),
            price: product.price.to_string(),
            back_href,
        }
    }
}

/// Pay button state.
#[derive(Clone)]
pub struct PayButtonView {
    pub slug: String,
    pub price: String,
    pub ready: bool,
    pub missing: Vec<&'static str>,
}

impl PayButtonView {
    fn new(slug: &str, price: String, buyer: &BuyerInfo) -> Self {
        Self {
            slug: slug.to_string(),
            price,
            ready: buyer.is_ready_to_pay(),
            missing: buyer.missing_fields().iter().map(BuyerField::as_str).collect(),
        }
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutShowTemplate {
    pub product: ProductView,
    pub button: PayButtonView,
}

/// Pay button fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/pay_button.html")]
pub struct PayButtonTemplate {
    pub button: PayButtonView,
}

/// Payment widget launch fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/payment_widget.html")]
pub struct PaymentWidgetTemplate {
    pub tx_ref: String,
    pub config_json: String,
}

/// Outcome of a relayed widget callback.
#[derive(Debug, Serialize)]
pub struct CallbackBody {
    pub success: bool,
    pub phase: &'static str,
    pub notification: Notification,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectView>,
}

/// Where the browser should go next, and when.
#[derive(Debug, Serialize)]
pub struct RedirectView {
    pub to: String,
    pub after_secs: u64,
}

impl CallbackBody {
    fn failed(err: &CheckoutError) -> Self {
        Self {
            success: false,
            phase: "failed",
            notification: err.notification(),
            retryable: err.is_retryable(),
            redirect: None,
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn pending_checkout(session: &Session) -> Option<PendingCheckout> {
    session
        .get::<PendingCheckout>(session_keys::PENDING_CHECKOUT)
        .await
        .ok()
        .flatten()
}

async fn set_pending_checkout(session: &Session, pending: PendingCheckout) {
    if let Err(e) = session.insert(session_keys::PENDING_CHECKOUT, pending).await {
        warn!(error = %e, "Failed to store pending checkout in session");
    }
}

/// Session id used to hold one pending attempt per browser.
///
/// A browser without a session gets one stored now, so its id is known
/// before the attempt is registered.
async fn session_owner(session: &Session) -> Option<String> {
    if session.id().is_none()
        && let Err(e) = session.save().await
    {
        warn!(error = %e, "Failed to create checkout session");
    }
    session.id().map(|id| id.to_string())
}

/// Forget the pending attempt if it is the one that just finished.
async fn clear_pending_checkout(session: &Session, tx_ref: &str) {
    if pending_checkout(session)
        .await
        .is_some_and(|pending| pending.tx_ref == tx_ref)
        && let Err(e) = session
            .remove::<PendingCheckout>(session_keys::PENDING_CHECKOUT)
            .await
    {
        warn!(error = %e, "Failed to clear pending checkout from session");
    }
}

fn error_fragment(err: &CheckoutError) -> Response {
    (
        err.status_code(),
        NotificationTemplate {
            notification: err.notification(),
        },
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the checkout page, or the not-found view.
#[instrument(skip(state), fields(slug = %slug))]
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match product::resolve(state.backend(), &slug).await {
        Resolution::Found(product) => {
            let view = ProductView::new(&slug, &product);
            let button = PayButtonView::new(&slug, view.price.clone(), &BuyerInfo::default());
            CheckoutShowTemplate {
                product: view,
                button,
            }
            .into_response()
        }
        Resolution::NotFound { reason } => not_found_page("Product not found", reason),
    }
}

/// Re-render the pay button from the current field values (HTMX).
///
/// POST /checkout/{slug}/buyer
pub async fn buyer(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Form(buyer): Form<BuyerInfo>,
) -> Response {
    // The price label only needs a catalog hit for courses, which is cached.
    let price = product::resolve(state.backend(), &slug)
        .await
        .product()
        .map(|p| p.price.to_string())
        .unwrap_or_default();

    PayButtonTemplate {
        button: PayButtonView::new(&slug, price, &buyer),
    }
    .into_response()
}

/// Start a payment attempt and return the widget launch fragment.
///
/// POST /checkout/{slug}/pay
#[instrument(skip(state, session, buyer), fields(slug = %slug))]
pub async fn pay(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
    Form(buyer): Form<BuyerInfo>,
) -> Response {
    let product = match product::resolve(state.backend(), &slug).await {
        Resolution::Found(product) => product,
        Resolution::NotFound { reason } => {
            return error_fragment(&CheckoutError::NotFound(reason));
        }
    };

    let form = CheckoutForm::with_buyer(product.clone(), buyer);
    let config = match form.payment_config(&state.config().payment, Utc::now()) {
        Ok(config) => config,
        Err(e) => return error_fragment(&e),
    };

    let mut checkout = CheckoutSession::new(product);
    if let Err(e) = checkout.begin(&config) {
        return error_fragment(&e);
    }

    let owner = session_owner(&session).await;
    let tx_ref = match state
        .attempts()
        .start(state.completion(), checkout, owner.as_deref())
        .await
    {
        Ok(tx_ref) => tx_ref,
        Err(e) => return error_fragment(&e),
    };

    let config_json = match serde_json::to_string(&config) {
        Ok(json) => json,
        Err(e) => {
            return AppError::Internal(format!("payment widget config: {e}")).into_response();
        }
    };

    set_pending_checkout(
        &session,
        PendingCheckout {
            tx_ref: tx_ref.to_string(),
            slug: slug.clone(),
        },
    )
    .await;
    add_breadcrumb(
        "checkout",
        "Payment widget opened",
        Some(&[("tx_ref", tx_ref.as_str()), ("slug", slug.as_str())]),
    );

    PaymentWidgetTemplate {
        tx_ref: tx_ref.to_string(),
        config_json,
    }
    .into_response()
}

/// Receive the widget callback relayed by the browser.
///
/// POST /checkout/callback
#[instrument(skip(state, session, response), fields(tx_ref = %response.tx_ref))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Json(response): Json<WidgetResponse>,
) -> Response {
    let tx_ref = response.tx_ref.clone();
    let outcome = state.attempts().deliver(response).await;
    clear_pending_checkout(&session, &tx_ref).await;

    match outcome {
        Ok(CheckoutPhase::Success(redirect)) => (
            StatusCode::OK,
            Json(CallbackBody {
                success: true,
                phase: "success",
                notification: Notification::success(
                    "Payment successful!",
                    "Thank you for your purchase. You will receive an email with further instructions.",
                ),
                retryable: false,
                redirect: Some(RedirectView {
                    to: redirect.to,
                    after_secs: redirect.after.as_secs(),
                }),
            }),
        )
            .into_response(),
        Ok(CheckoutPhase::Failed(err)) | Err(err) => {
            (err.status_code(), Json(CallbackBody::failed(&err))).into_response()
        }
        Ok(phase) => {
            warn!(phase = phase.name(), "Attempt ended without an outcome");
            let err = CheckoutError::UnknownAttempt(tx_ref);
            (err.status_code(), Json(CallbackBody::failed(&err))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use learnfront_core::{CurrencyCode, Price};
    use rust_decimal::Decimal;

    use super::*;
    use crate::checkout::EbookTier;

    #[test]
    fn test_pay_button_lists_missing_fields() {
        let mut buyer = BuyerInfo::default();
        buyer.set_email("ada@example.com");
        let view = PayButtonView::new("ebook-pro", "$49.99".to_string(), &buyer);
        assert!(!view.ready);
        assert_eq!(view.missing, ["name", "phone"]);
    }

    #[test]
    fn test_product_view_back_link() {
        let ebook = ProductView::new("ebook-pro", &Product::ebook(EbookTier::Pro));
        assert_eq!(ebook.back_href, "/courses");
        assert_eq!(ebook.price, "$49.99");

        let course = Product {
            id: "c1".to_string(),
            title: "Async Rust".to_string(),
            price: Price::new(Decimal::new(10, 0), CurrencyCode::EUR),
            kind: ProductKind::Course {
                slug: "async-rust".to_string(),
            },
        };
        assert_eq!(
            ProductView::new("async-rust", &course).back_href,
            "/courses/async-rust"
        );
    }

    #[test]
    fn test_failed_callback_body() {
        let body = CallbackBody::failed(&CheckoutError::PaymentDeclined {
            status: "failed".to_string(),
        });
        assert!(!body.success);
        assert!(body.retryable);
        assert!(body.notification.is_error());
    }
}
