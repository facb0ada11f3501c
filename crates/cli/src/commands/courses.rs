//! Course management commands.
//!
//! # Usage
//!
//! ```bash
//! lf-cli courses list
//! lf-cli courses create -t "Async Rust" -s async-rust -p 49.99 -c USD
//! lf-cli courses update 65f0c0ffee --level advanced
//! ```
//!
//! # Environment Variables
//!
//! - `BACKEND_URL` - Catalog backend base URL
//! - `BACKEND_API_KEY` - Optional bearer token

use learnfront_storefront::backend::{BackendClient, BackendError, CourseInput, CourseRecord};
use learnfront_storefront::config::{BackendConfig, ConfigError};
use thiserror::Error;

use crate::CourseFields;

/// Errors that can occur during course operations.
#[derive(Debug, Error)]
pub enum CourseCommandError {
    /// Backend settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A field required to create a course was not given.
    #[error("Missing required field: --{0}")]
    MissingField(&'static str),

    /// The assembled course failed validation.
    #[error("Invalid course: {0}")]
    Invalid(String),
}

/// Build a backend client from the environment.
///
/// # Errors
///
/// Returns an error if the backend variables are missing or malformed.
pub fn connect() -> Result<BackendClient, CourseCommandError> {
    let config = BackendConfig::from_env()?;
    tracing::info!("Using backend at {}", config.base_url);
    Ok(BackendClient::new(&config)?)
}

/// List every course.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub async fn list(client: &BackendClient) -> Result<(), CourseCommandError> {
    let courses = client.list_courses().await?;

    if courses.is_empty() {
        tracing::info!("No courses found");
        return Ok(());
    }

    tracing::info!("{} course(s):", courses.len());
    for course in &courses {
        tracing::info!("  {}", summary_line(course));
    }
    Ok(())
}

/// Show a single course.
///
/// # Errors
///
/// Returns an error if the course does not exist or the request fails.
pub async fn show(client: &BackendClient, id: &str) -> Result<(), CourseCommandError> {
    let course = client.course_by_id(id).await?;

    tracing::info!("{}", summary_line(&course));
    tracing::info!("  Instructor: {}", or_dash(&course.instructor));
    tracing::info!("  Level: {}", or_dash(&course.level));
    tracing::info!("  Duration: {}", or_dash(&course.duration));
    tracing::info!("  Description: {}", or_dash(&course.description));
    if !course.preview_images.is_empty() {
        tracing::info!("  Preview images: {}", course.preview_images.join(", "));
    }
    Ok(())
}

/// Create a course.
///
/// # Errors
///
/// Returns an error if a required field is missing, validation fails, or
/// the backend rejects the write.
pub async fn create(
    client: &BackendClient,
    fields: CourseFields,
) -> Result<(), CourseCommandError> {
    let input = new_course(fields)?;
    input.validate().map_err(CourseCommandError::Invalid)?;

    tracing::info!("Creating course: {} ({})", input.title, input.slug);
    let created = client.create_course(&input).await?;

    tracing::info!("Course created successfully!");
    tracing::info!("  ID: {}", created.id);
    tracing::info!("  Slug: {}", created.slug);
    Ok(())
}

/// Update a course.
///
/// The current record is fetched first and the given fields are laid over
/// it, so the full record is sent back.
///
/// # Errors
///
/// Returns an error if the course cannot be fetched, the result fails
/// validation, or the backend rejects the write.
pub async fn update(
    client: &BackendClient,
    id: &str,
    fields: CourseFields,
) -> Result<(), CourseCommandError> {
    let current = client.course_by_id(id).await?;

    let mut input = CourseInput::from_record(&current);
    apply(&mut input, fields);
    input.validate().map_err(CourseCommandError::Invalid)?;

    tracing::info!("Updating course: {} ({})", id, input.slug);
    let updated = client.update_course(id, &input).await?;

    tracing::info!("Course updated successfully!");
    tracing::info!("  {}", summary_line(&updated));
    Ok(())
}

/// Delete a course.
///
/// # Errors
///
/// Returns an error if the backend rejects the delete.
pub async fn delete(client: &BackendClient, id: &str) -> Result<(), CourseCommandError> {
    tracing::info!("Deleting course: {}", id);
    client.delete_course(id).await?;
    tracing::info!("Course deleted");
    Ok(())
}

/// Assemble a new course from the flags, requiring title, slug and price.
fn new_course(fields: CourseFields) -> Result<CourseInput, CourseCommandError> {
    let title = fields
        .title
        .clone()
        .ok_or(CourseCommandError::MissingField("title"))?;
    let slug = fields
        .slug
        .clone()
        .ok_or(CourseCommandError::MissingField("slug"))?;
    let price = fields
        .price
        .ok_or(CourseCommandError::MissingField("price"))?;

    let mut input = CourseInput {
        title,
        description: String::new(),
        price,
        currency: fields.currency.unwrap_or_default(),
        instructor: String::new(),
        level: fields.level.unwrap_or_default(),
        slug,
        duration: String::new(),
        preview_content: String::new(),
        preview_images: Vec::new(),
    };
    apply(&mut input, fields);
    Ok(input)
}

/// Lay the given flags over an existing payload.
fn apply(input: &mut CourseInput, fields: CourseFields) {
    let CourseFields {
        title,
        slug,
        price,
        currency,
        description,
        instructor,
        level,
        duration,
        preview_content,
        preview_images,
    } = fields;

    if let Some(title) = title {
        input.title = title;
    }
    if let Some(slug) = slug {
        input.slug = slug;
    }
    if let Some(price) = price {
        input.price = price;
    }
    if let Some(currency) = currency {
        input.currency = currency;
    }
    if let Some(description) = description {
        input.description = description;
    }
    if let Some(instructor) = instructor {
        input.instructor = instructor;
    }
    if let Some(level) = level {
        input.level = level;
    }
    if let Some(duration) = duration {
        input.duration = duration;
    }
    if let Some(preview_content) = preview_content {
        input.preview_content = preview_content;
    }
    if !preview_images.is_empty() {
        input.preview_images = preview_images;
    }
}

fn summary_line(course: &CourseRecord) -> String {
    let price = course
        .price()
        .map_or_else(|| "unpriced".to_string(), |p| p.to_string());
    format!("{} [{}] /{} - {}", course.title, course.id, course.slug, price)
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}
