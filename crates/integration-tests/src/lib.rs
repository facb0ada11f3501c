//! Integration test harness for Learnfront.
//!
//! Every test gets its own in-process fake of the course/order backend and
//! its own storefront, both bound to ephemeral ports on 127.0.0.1. Nothing
//! external needs to be running.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p learnfront-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = FakeBackend::start(vec![course("c1", "intro", "Intro", Some(0.0))]).await?;
//! let storefront = TestStorefront::start(&backend).await?;
//! let resp = storefront.get("/courses/intro").await?;
//! assert_eq!(resp.status(), 200);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use learnfront_storefront::config::{
    BackendConfig, CheckoutSettings, PaymentWidgetSettings, StorefrontConfig,
};
use learnfront_storefront::routes;
use learnfront_storefront::state::AppState;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

/// Public key handed to the storefront under test.
pub const TEST_PUBLIC_KEY: &str = "FLWPUBK_TEST-5e1c0ffee5e1c0ffee5e1c0ffee5e1c0-X";

/// Redirect target configured for the storefront under test.
pub const TEST_REDIRECT_URL: &str = "/courses";

// =============================================================================
// Fake Backend
// =============================================================================

#[derive(Debug, Default)]
struct FakeData {
    courses: Vec<Value>,
    orders: Vec<Value>,
    claims: Vec<Value>,
    course_reads: usize,
    next_id: usize,
    fail_orders: bool,
    order_delay: Option<Duration>,
}

type Shared = Arc<Mutex<FakeData>>;

fn lock(data: &Shared) -> MutexGuard<'_, FakeData> {
    data.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory stand-in for the course/order REST backend.
///
/// Serves the same paths the storefront's client calls, under `/api`.
#[derive(Clone)]
pub struct FakeBackend {
    data: Shared,
    addr: SocketAddr,
}

impl FakeBackend {
    /// Start a fake backend seeded with `courses`.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start(courses: Vec<Value>) -> std::io::Result<Self> {
        let data: Shared = Arc::new(Mutex::new(FakeData {
            courses,
            ..FakeData::default()
        }));

        let api = Router::new()
            .route("/courses", get(list_courses).post(create_course))
            .route("/courses/claim", post(claim_course))
            .route("/courses/slug/{slug}", get(course_by_slug))
            .route(
                "/courses/{id}",
                get(course_by_id).put(update_course).delete(delete_course),
            )
            .route("/orders", post(record_order));
        let app = Router::new().nest("/api", api).with_state(data.clone());

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { data, addr })
    }

    /// API root the storefront should be pointed at.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Orders written so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        lock(&self.data).orders.clone()
    }

    /// Free-course claims received so far.
    #[must_use]
    pub fn claims(&self) -> Vec<Value> {
        lock(&self.data).claims.clone()
    }

    /// Current course records.
    #[must_use]
    pub fn courses(&self) -> Vec<Value> {
        lock(&self.data).courses.clone()
    }

    /// Number of course reads served (list, by slug, by id).
    #[must_use]
    pub fn course_reads(&self) -> usize {
        lock(&self.data).course_reads
    }

    /// Make order writes fail with a 500.
    pub fn fail_orders(&self, fail: bool) {
        lock(&self.data).fail_orders = fail;
    }

    /// Hold every order write for `delay` before answering.
    pub fn delay_orders(&self, delay: Duration) {
        lock(&self.data).order_delay = Some(delay);
    }
}

/// A course record in the shape the backend returns.
#[must_use]
pub fn course(id: &str, slug: &str, title: &str, price: Option<f64>) -> Value {
    json!({
        "_id": id,
        "title": title,
        "description": format!("Everything about {title}."),
        "price": price,
        "currency": price.map(|_| "USD"),
        "instructor": "Ada Lovelace",
        "level": "beginner",
        "slug": slug,
        "duration": "3 hours",
        "preview_content": "",
        "preview_images": [],
    })
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" })))
}

async fn list_courses(State(data): State<Shared>) -> Json<Value> {
    let mut data = lock(&data);
    data.course_reads += 1;
    Json(json!({ "courses": data.courses }))
}

async fn course_by_slug(
    State(data): State<Shared>,
    Path(slug): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut data = lock(&data);
    data.course_reads += 1;
    data.courses
        .iter()
        .find(|c| c["slug"] == slug.as_str())
        .map_or_else(not_found, |c| (StatusCode::OK, Json(c.clone())))
}

async fn course_by_id(
    State(data): State<Shared>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut data = lock(&data);
    data.course_reads += 1;
    data.courses
        .iter()
        .find(|c| c["_id"] == id.as_str())
        .map_or_else(not_found, |c| (StatusCode::OK, Json(c.clone())))
}

async fn create_course(
    State(data): State<Shared>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut data = lock(&data);
    data.next_id += 1;
    body["_id"] = json!(format!("course-{}", data.next_id));
    data.courses.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn update_course(
    State(data): State<Shared>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut data = lock(&data);
    let Some(existing) = data.courses.iter_mut().find(|c| c["_id"] == id.as_str()) else {
        return not_found();
    };
    body["_id"] = json!(id);
    *existing = body.clone();
    (StatusCode::OK, Json(body))
}

async fn delete_course(State(data): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut data = lock(&data);
    let before = data.courses.len();
    data.courses.retain(|c| c["_id"] != id.as_str());
    if data.courses.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn claim_course(State(data): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    lock(&data).claims.push(body);
    Json(json!({ "message": "Course sent" }))
}

async fn record_order(
    State(data): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let delay = lock(&data).order_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut data = lock(&data);
    if data.fail_orders {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "orders collection unavailable" })),
        );
    }
    data.next_id += 1;
    let id = format!("order-{}", data.next_id);
    data.orders.push(body);
    (StatusCode::CREATED, Json(json!({ "_id": id })))
}

// =============================================================================
// Storefront Under Test
// =============================================================================

/// Backend settings pointing at `backend`.
///
/// # Errors
///
/// Returns an error if the fake's URL does not parse.
pub fn backend_config(backend: &FakeBackend) -> Result<BackendConfig, url::ParseError> {
    Ok(BackendConfig {
        base_url: Url::parse(&backend.api_url())?,
        api_key: None,
        timeout: Duration::from_secs(5),
        cache_ttl: Duration::from_secs(60),
    })
}

/// Storefront configuration pointing at `backend`.
///
/// # Errors
///
/// Returns an error if the fake's URL does not parse.
pub fn storefront_config(backend: &FakeBackend) -> Result<StorefrontConfig, url::ParseError> {
    Ok(StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        backend: backend_config(backend)?,
        payment: PaymentWidgetSettings {
            public_key: TEST_PUBLIC_KEY.to_string(),
            payment_options: "card".to_string(),
            logo_url: None,
        },
        checkout: CheckoutSettings {
            redirect_url: TEST_REDIRECT_URL.to_string(),
            redirect_delay: Duration::from_secs(5),
            attempt_ttl: Duration::from_secs(60),
            late_callback_window: Duration::from_secs(60),
        },
        sentry_dsn: None,
        sentry_environment: None,
    })
}

/// A running storefront plus a cookie-keeping client for it.
pub struct TestStorefront {
    pub url: String,
    pub client: reqwest::Client,
    pub state: AppState,
}

impl TestStorefront {
    /// Start a storefront backed by `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be built or no port can be bound.
    pub async fn start(backend: &FakeBackend) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with(storefront_config(backend)?).await
    }

    /// Start a storefront from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be built or no port can be bound.
    pub async fn start_with(
        config: StorefrontConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let state = AppState::new(config)?;
        let app = routes::app(state.clone());

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            url: format!("http://{addr}"),
            client: browser()?,
            state,
        })
    }

    /// GET a storefront path.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(format!("{}{path}", self.url)).send().await
    }

    /// POST a form to a storefront path.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{path}", self.url))
            .form(form)
            .send()
            .await
    }

    /// POST JSON to a storefront path.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{path}", self.url))
            .json(body)
            .send()
            .await
    }
}

/// A client with its own cookie jar, i.e. a separate browser.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub fn browser() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Buyer fields for a complete checkout form.
pub const BUYER: &[(&str, &str)] = &[
    ("name", "Ada Lovelace"),
    ("email", "ada@example.com"),
    ("phone", "+2348012345678"),
];

/// Pull the transaction reference out of a payment widget fragment.
#[must_use]
pub fn extract_tx_ref(html: &str) -> Option<String> {
    let marker = "data-tx-ref=\"";
    let start = html.find(marker)? + marker.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tx_ref() {
        let html = r#"<div data-payment-widget data-tx-ref="tx-1700000000000-ab12cd34" data-config="{}">"#;
        assert_eq!(
            extract_tx_ref(html).as_deref(),
            Some("tx-1700000000000-ab12cd34")
        );
        assert_eq!(extract_tx_ref("<p>nothing</p>"), None);
    }

    #[test]
    fn test_course_fixture_shape() {
        let free = course("c1", "intro", "Intro", Some(0.0));
        assert_eq!(free["currency"], "USD");
        let unpriced = course("c2", "draft", "Draft", None);
        assert!(unpriced["price"].is_null());
        assert!(unpriced["currency"].is_null());
    }
}
