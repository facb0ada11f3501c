//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Redirect to /courses
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (backend reachable)
//!
//! # Catalog
//! GET  /courses                  - Course listing
//! GET  /courses/{slug}           - Course preview
//! POST /courses/{slug}/claim     - Claim a free course (HTMX fragment)
//!
//! # Checkout
//! GET  /checkout/{slug}          - Checkout page (ebook-<tier> or course slug)
//! POST /checkout/{slug}/buyer    - Re-render pay button (HTMX fragment)
//! POST /checkout/{slug}/pay      - Start a payment attempt (HTMX fragment)
//! POST /checkout/callback        - Payment widget callback relay (JSON)
//! ```

pub mod checkout;
pub mod courses;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::checkout::{CheckoutError, Notification, NotFoundReason};
use crate::filters;
use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Terminal view for an unknown product or course.
#[derive(Template, WebTemplate)]
#[template(path = "errors/not_found.html")]
pub struct NotFoundTemplate {
    pub title: String,
    pub notification: Option<Notification>,
}

/// Notification fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/notification.html")]
pub struct NotificationTemplate {
    pub notification: Notification,
}

/// Render the not-found view. Transient lookup failures add a notification.
pub(crate) fn not_found_page(title: &str, reason: NotFoundReason) -> Response {
    let notification = reason
        .is_transient()
        .then(|| CheckoutError::NotFound(reason).notification());

    (
        StatusCode::NOT_FOUND,
        NotFoundTemplate {
            title: title.to_string(),
            notification,
        },
    )
        .into_response()
}

/// Create the course routes router.
pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(courses::index))
        .route("/{slug}", get(courses::show))
        .route("/{slug}/claim", post(courses::claim))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/callback", post(checkout::callback))
        .route("/{slug}", get(checkout::show))
        .route("/{slug}/buyer", post(checkout::buyer))
        .route("/{slug}/pay", post(checkout::pay))
}

/// Create all page routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/courses") }))
        .nest("/courses", course_routes())
        .nest("/checkout", checkout_routes())
}

/// Build the full application: routes, static files, and middleware.
///
/// Sentry layers are added by the binary on top of this.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = tracing::field::Empty,
                        )
                    }),
                )
                .layer(from_fn(request_id_middleware))
                .layer(session_layer),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the backend is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.backend().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Backend not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
