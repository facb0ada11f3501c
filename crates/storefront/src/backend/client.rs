//! HTTP client for the course/order backend.
//!
//! JSON over HTTPS with `reqwest`. Catalog reads are cached with `moka`
//! for the configured TTL; only hits are cached.

use std::sync::Arc;

use learnfront_core::OrderId;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::BackendConfig;

use super::cache::{CacheKey, CacheValue};
use super::types::{
    ClaimRequest, CourseInput, CourseListBody, CourseRecord, NewOrder, OrderReceipt,
};
use super::{BackendError, CatalogGateway, OrderGateway};

/// Longest slice of a response body copied into logs and errors.
const BODY_PREVIEW_CHARS: usize = 500;

/// Client for the course/order backend.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("learnfront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                cache,
            }),
        })
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build an endpoint URL by appending path segments to the base.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.inner.client.request(method, url);
        match &self.inner.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        request.send().await.map_err(transport_error)
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// List every course.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a course list.
    #[instrument(skip(self))]
    pub async fn list_courses(&self) -> Result<Vec<CourseRecord>, BackendError> {
        if let Some(CacheValue::Courses(courses)) = self.inner.cache.get(&CacheKey::Courses).await
        {
            debug!("Cache hit for course list");
            return Ok(courses);
        }

        let url = self.endpoint(&["courses"])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let text = success_body(response).await?;
        let courses: Vec<CourseRecord> = parse::<CourseListBody>(&text)?.into();

        self.inner
            .cache
            .insert(CacheKey::Courses, CacheValue::Courses(courses.clone()))
            .await;

        Ok(courses)
    }

    /// Look up a course by slug.
    ///
    /// A 404, an empty body, or a literal `null` all mean "no such course".
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a course.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn course_by_slug(&self, slug: &str) -> Result<Option<CourseRecord>, BackendError> {
        let cache_key = CacheKey::Course(slug.to_string());

        if let Some(CacheValue::Course(course)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for course");
            return Ok(Some(*course));
        }

        let url = self.endpoint(&["courses", "slug", slug])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Backend has no course for slug");
            return Ok(None);
        }

        let text = success_body(response).await?;
        let Some(course) = parse_optional::<CourseRecord>(&text)? else {
            return Ok(None);
        };

        self.inner
            .cache
            .insert(cache_key, CacheValue::Course(Box::new(course.clone())))
            .await;

        Ok(Some(course))
    }

    /// Fetch a course by backend id. Not cached; used by admin tooling.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if no course has this id.
    #[instrument(skip(self), fields(course_id = %id))]
    pub async fn course_by_id(&self, id: &str) -> Result<CourseRecord, BackendError> {
        let url = self.endpoint(&["courses", id])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!("course {id}")));
        }

        let text = success_body(response).await?;
        parse_optional::<CourseRecord>(&text)?
            .ok_or_else(|| BackendError::NotFound(format!("course {id}")))
    }

    /// Create a course.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidInput`] if the payload fails validation,
    /// or an error if the request fails.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_course(&self, input: &CourseInput) -> Result<CourseRecord, BackendError> {
        input.validate().map_err(BackendError::InvalidInput)?;

        let url = self.endpoint(&["courses"])?;
        let response = self.send(self.request(Method::POST, url).json(input)).await?;
        let text = success_body(response).await?;
        let course = parse::<CourseRecord>(&text)?;

        self.invalidate_catalog().await;
        info!(course_id = %course.id, "Course created");
        Ok(course)
    }

    /// Replace a course record.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidInput`] if the payload fails validation,
    /// [`BackendError::NotFound`] for an unknown id, or an error if the
    /// request fails.
    #[instrument(skip(self, input), fields(course_id = %id))]
    pub async fn update_course(
        &self,
        id: &str,
        input: &CourseInput,
    ) -> Result<CourseRecord, BackendError> {
        input.validate().map_err(BackendError::InvalidInput)?;

        let url = self.endpoint(&["courses", id])?;
        let response = self.send(self.request(Method::PUT, url).json(input)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!("course {id}")));
        }
        let text = success_body(response).await?;
        let course = parse::<CourseRecord>(&text)?;

        self.invalidate_catalog().await;
        info!("Course updated");
        Ok(course)
    }

    /// Delete a course.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] for an unknown id, or an error if the
    /// request fails.
    #[instrument(skip(self), fields(course_id = %id))]
    pub async fn delete_course(&self, id: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["courses", id])?;
        let response = self.send(self.request(Method::DELETE, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!("course {id}")));
        }
        success_body(response).await?;

        self.invalidate_catalog().await;
        info!("Course deleted");
        Ok(())
    }

    /// Claim a free course; the backend emails it to the buyer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, claim), fields(course_id = %claim.course_id))]
    pub async fn claim_course(&self, claim: &ClaimRequest) -> Result<(), BackendError> {
        let url = self.endpoint(&["courses", "claim"])?;
        let response = self.send(self.request(Method::POST, url).json(claim)).await?;
        success_body(response).await?;
        info!(email_domain = %claim.email.domain(), "Course claimed");
        Ok(())
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Write a completed order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects the order.
    #[instrument(skip(self, order), fields(tx_ref = %order.tx_ref, status = %order.status))]
    pub async fn record_order(&self, order: &NewOrder) -> Result<OrderReceipt, BackendError> {
        let url = self.endpoint(&["orders"])?;
        let response = self.send(self.request(Method::POST, url).json(order)).await?;
        let text = success_body(response).await?;
        let receipt = parse_optional::<OrderReceipt>(&text)?.unwrap_or_default();
        info!(order_id = ?receipt.id.as_ref().map(OrderId::as_str), "Order recorded");
        Ok(receipt)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check that the backend answers the course listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn health_check(&self) -> Result<(), BackendError> {
        let url = self.endpoint(&["courses"])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        success_body(response).await.map(|_| ())
    }

    /// Drop every cached catalog entry.
    pub async fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    /// Release cached state. Called once the server has stopped accepting requests.
    pub async fn shutdown(&self) {
        self.invalidate_catalog().await;
        debug!("Backend client cache cleared");
    }
}

impl CatalogGateway for BackendClient {
    async fn course_by_slug(&self, slug: &str) -> Result<Option<CourseRecord>, BackendError> {
        Self::course_by_slug(self, slug).await
    }

    async fn list_courses(&self) -> Result<Vec<CourseRecord>, BackendError> {
        Self::list_courses(self).await
    }
}

impl OrderGateway for BackendClient {
    async fn record_order(&self, order: &NewOrder) -> Result<OrderReceipt, BackendError> {
        Self::record_order(self, order).await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        tracing::warn!(error = %err, "Backend request timed out");
        BackendError::Timeout
    } else {
        BackendError::Http(err)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Read the body, turning non-success statuses into [`BackendError::Api`].
async fn success_body(response: Response) -> Result<String, BackendError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %preview(&text),
            "Backend returned non-success status"
        );
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: preview(&text),
        });
    }

    Ok(text)
}

fn parse<T: DeserializeOwned>(text: &str) -> Result<T, BackendError> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, body = %preview(text), "Failed to parse backend response");
        BackendError::Parse(e.to_string())
    })
}

/// Like [`parse`], but an empty body or `null` is `None`.
fn parse_optional<T: DeserializeOwned>(text: &str) -> Result<Option<T>, BackendError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse::<Option<T>>(text)
}
