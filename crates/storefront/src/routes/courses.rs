//! Course catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use learnfront_core::Email;
use serde::Deserialize;
use tracing::instrument;

use crate::backend::{ClaimRequest, CourseRecord};
use crate::checkout::{CheckoutError, NotFoundReason, Notification};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::state::AppState;

use super::{NotificationTemplate, not_found_page};

/// Course card data for the listing.
#[derive(Clone)]
pub struct CourseCardView {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub price: String,
    pub level: String,
    pub duration: String,
    pub instructor: String,
    pub thumbnail: Option<String>,
}

/// Course data for the preview page.
#[derive(Clone)]
pub struct CourseDetailView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub level: String,
    pub duration: String,
    pub instructor: String,
    pub preview_content: String,
    pub preview_images: Vec<String>,
    pub is_free: bool,
    pub is_purchasable: bool,
}

const SUMMARY_CHARS: usize = 160;

fn price_label(course: &CourseRecord) -> String {
    match course.price() {
        Some(price) if price.amount.is_zero() => "Free".to_string(),
        Some(price) => price.to_string(),
        None => "Price unavailable".to_string(),
    }
}

fn summarize(text: &str) -> String {
    if text.chars().count() <= SUMMARY_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SUMMARY_CHARS).collect();
    format!("{}…", cut.trim_end())
}

impl From<&CourseRecord> for CourseCardView {
    fn from(course: &CourseRecord) -> Self {
        Self {
            slug: course.slug.clone(),
            title: course.title.clone(),
            summary: summarize(&course.description),
            price: price_label(course),
            level: course.level.clone(),
            duration: course.duration.clone(),
            instructor: course.instructor.clone(),
            thumbnail: course.thumbnail().map(String::from),
        }
    }
}

impl From<&CourseRecord> for CourseDetailView {
    fn from(course: &CourseRecord) -> Self {
        let is_free = course.is_free();
        Self {
            slug: course.slug.clone(),
            title: course.title.clone(),
            description: course.description.clone(),
            price: price_label(course),
            level: course.level.clone(),
            duration: course.duration.clone(),
            instructor: course.instructor.clone(),
            preview_content: course.preview_content.clone(),
            preview_images: course.preview_images.clone(),
            is_free,
            is_purchasable: !is_free && course.price().is_some(),
        }
    }
}

/// Course listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "courses/index.html")]
pub struct CoursesIndexTemplate {
    pub courses: Vec<CourseCardView>,
    pub notification: Option<Notification>,
}

/// Course preview page template.
#[derive(Template, WebTemplate)]
#[template(path = "courses/show.html")]
pub struct CourseShowTemplate {
    pub course: CourseDetailView,
}

/// Claim form data.
#[derive(Debug, Deserialize)]
pub struct ClaimForm {
    #[serde(default)]
    pub email: String,
}

/// Display the course catalog.
///
/// A backend failure renders the page with an error notification instead
/// of the list.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Response {
    match state.backend().list_courses().await {
        Ok(courses) => CoursesIndexTemplate {
            courses: courses.iter().map(CourseCardView::from).collect(),
            notification: None,
        }
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load course catalog");
            let err = CheckoutError::from(e);
            (
                err.status_code(),
                CoursesIndexTemplate {
                    courses: Vec::new(),
                    notification: Some(err.notification()),
                },
            )
                .into_response()
        }
    }
}

/// Display a course preview.
#[instrument(skip(state), fields(slug = %slug))]
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.backend().course_by_slug(&slug).await {
        Ok(Some(course)) => CourseShowTemplate {
            course: CourseDetailView::from(&course),
        }
        .into_response(),
        Ok(None) => not_found_page("Course not found", NotFoundReason::Missing),
        Err(e) => {
            tracing::warn!(error = %e, "Course lookup failed");
            not_found_page("Course not found", NotFoundReason::LookupFailed)
        }
    }
}

/// Claim a free course (HTMX fragment).
///
/// POST /courses/{slug}/claim
#[instrument(skip(state, form), fields(slug = %slug))]
pub async fn claim(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Form(form): Form<ClaimForm>,
) -> Response {
    let Ok(email) = Email::parse(&form.email) else {
        return notice(
            StatusCode::UNPROCESSABLE_ENTITY,
            Notification::error(
                "Invalid email",
                "Please enter a valid email address to get this course for free.",
            ),
        );
    };

    let course = match state.backend().course_by_slug(&slug).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            return notice(
                StatusCode::NOT_FOUND,
                Notification::error("Course not found", "This course no longer exists."),
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Course lookup failed");
            return claim_failed(e.into());
        }
    };

    if !course.is_free() {
        return notice(
            StatusCode::BAD_REQUEST,
            Notification::error("Not a free course", "This course has to be purchased."),
        );
    }

    let request = ClaimRequest {
        course_id: course.id.clone(),
        email,
    };
    if let Err(e) = state.backend().claim_course(&request).await {
        tracing::error!(error = %e, "Course claim failed");
        return claim_failed(e.into());
    }

    add_breadcrumb("catalog", "Free course claimed", Some(&[("slug", slug.as_str())]));
    notice(
        StatusCode::OK,
        Notification::success(
            "Success!",
            format!("{} has been sent to your email.", course.title),
        ),
    )
}

fn claim_failed(err: CheckoutError) -> Response {
    notice(err.status_code(), err.notification())
}

fn notice(status: StatusCode, notification: Notification) -> Response {
    (status, NotificationTemplate { notification }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(price: Option<f64>) -> CourseRecord {
        CourseRecord {
            id: "c1".to_string(),
            title: "Async Rust".to_string(),
            description: "d".repeat(200),
            price,
            currency: Some("USD".to_string()),
            instructor: "Ada".to_string(),
            level: "advanced".to_string(),
            slug: "async-rust".to_string(),
            duration: "3h".to_string(),
            preview_content: String::new(),
            preview_images: vec!["/a.png".to_string(), "/b.png".to_string()],
        }
    }

    #[test]
    fn test_card_view() {
        let card = CourseCardView::from(&record(Some(19.0)));
        assert_eq!(card.price, "$19.00");
        assert_eq!(card.thumbnail.as_deref(), Some("/a.png"));
        assert!(card.summary.ends_with('…'));
        assert_eq!(card.summary.chars().count(), SUMMARY_CHARS + 1);
    }

    #[test]
    fn test_detail_view_purchase_flags() {
        let free = CourseDetailView::from(&record(Some(0.0)));
        assert!(free.is_free);
        assert!(!free.is_purchasable);
        assert_eq!(free.price, "Free");

        let paid = CourseDetailView::from(&record(Some(10.0)));
        assert!(paid.is_purchasable);

        let unpriced = CourseDetailView::from(&record(None));
        assert!(!unpriced.is_free);
        assert!(!unpriced.is_purchasable);
        assert_eq!(unpriced.price, "Price unavailable");
    }
}
