//! Wire types for the course/order backend.
//!
//! Read types are lenient: missing optional fields default, and course ids
//! are accepted as either `id` or `_id`. Write types are validated before
//! they leave the process.

use learnfront_core::{CourseLevel, CurrencyCode, Email, OrderId, OrderStatus, Price};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

// =============================================================================
// Courses
// =============================================================================

/// A course as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Plain JSON number. Absent or `null` means the course is not for sale.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub preview_content: String,
    #[serde(default)]
    pub preview_images: Vec<String>,
}

impl CourseRecord {
    /// Price and currency as a validated [`Price`].
    ///
    /// `None` when either is missing, the amount is negative or not finite,
    /// or the currency is not a three-letter code.
    #[must_use]
    pub fn price(&self) -> Option<Price> {
        let amount = self.price?;
        let currency = CurrencyCode::parse(self.currency.as_deref()?).ok()?;
        let price = Price::from_f64(amount, currency).ok()?;
        price.validate().ok()?;
        Some(price)
    }

    /// Whether the course can be claimed without paying.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price().is_some_and(|p| p.amount.is_zero())
    }

    /// First preview image, used as the card thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.preview_images.first().map(String::as_str)
    }
}

/// Course listing body. The backend has shipped both shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CourseListBody {
    Wrapped { courses: Vec<CourseRecord> },
    Bare(Vec<CourseRecord>),
}

impl From<CourseListBody> for Vec<CourseRecord> {
    fn from(body: CourseListBody) -> Self {
        match body {
            CourseListBody::Wrapped { courses } | CourseListBody::Bare(courses) => courses,
        }
    }
}

/// Create/update payload for a course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseInput {
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub instructor: String,
    pub level: CourseLevel,
    pub slug: String,
    pub duration: String,
    pub preview_content: String,
    pub preview_images: Vec<String>,
}

impl CourseInput {
    /// Check the payload before it is sent.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found: an empty title, a
    /// slug that is not lowercase letters, digits, and single hyphens, or a
    /// negative price.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if !is_url_safe_slug(&self.slug) {
            return Err(format!(
                "slug '{}' must be lowercase letters, digits, and single hyphens",
                self.slug
            ));
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err("price cannot be negative".to_string());
        }
        Ok(())
    }

    /// Start an update payload from an existing record.
    ///
    /// Unknown levels fall back to the default and a missing or malformed
    /// currency falls back to USD, so the caller can fix them with overrides.
    #[must_use]
    pub fn from_record(record: &CourseRecord) -> Self {
        let price = record.price.and_then(Decimal::from_f64).unwrap_or_default();
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            price: price.normalize(),
            currency: record
                .currency
                .as_deref()
                .and_then(|c| CurrencyCode::parse(c).ok())
                .unwrap_or_default(),
            instructor: record.instructor.clone(),
            level: record.level.parse().unwrap_or_default(),
            slug: record.slug.clone(),
            duration: record.duration.clone(),
            preview_content: record.preview_content.clone(),
            preview_images: record.preview_images.clone(),
        }
    }
}

/// Slugs are lowercase ASCII words joined by single hyphens.
#[must_use]
pub fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .split('-')
            .all(|part| {
                !part.is_empty()
                    && part
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            })
}

/// Free-course claim payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub course_id: String,
    pub email: Email,
}

// =============================================================================
// Orders
// =============================================================================

/// Order record written after a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    /// Resolved product price, never the amount echoed by the widget.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub product_id: String,
    pub tx_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Backend acknowledgement of a written order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderReceipt {
    #[serde(default, alias = "_id")]
    pub id: Option<OrderId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(price: Option<f64>, currency: Option<&str>) -> CourseRecord {
        CourseRecord {
            id: "c1".to_string(),
            title: "Intro".to_string(),
            description: String::new(),
            price,
            currency: currency.map(str::to_string),
            instructor: String::new(),
            level: "beginner".to_string(),
            slug: "intro".to_string(),
            duration: String::new(),
            preview_content: String::new(),
            preview_images: vec![],
        }
    }

    #[test]
    fn test_record_accepts_mongo_style_id() {
        let json = r#"{"_id":"65f0","title":"Rust","price":19.5,"currency":"usd"}"#;
        let course: CourseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(course.id, "65f0");
        assert_eq!(course.price().unwrap().to_string(), "$19.50");
        assert!(course.preview_images.is_empty());
    }

    #[test]
    fn test_record_price_requires_both_parts() {
        assert!(record(None, Some("USD")).price().is_none());
        assert!(record(Some(10.0), None).price().is_none());
        assert!(record(Some(-1.0), Some("USD")).price().is_none());
        assert!(record(Some(10.0), Some("dollars")).price().is_none());
        assert!(record(Some(0.0), Some("NGN")).is_free());
    }

    #[test]
    fn test_list_body_shapes() {
        let bare: CourseListBody = serde_json::from_str(r#"[{"id":"a","title":"A"}]"#).unwrap();
        let wrapped: CourseListBody =
            serde_json::from_str(r#"{"courses":[{"id":"a","title":"A"}]}"#).unwrap();
        assert_eq!(Vec::from(bare).len(), 1);
        assert_eq!(Vec::from(wrapped).first().unwrap().id, "a");
    }

    #[test]
    fn test_slug_rules() {
        assert!(is_url_safe_slug("intro-to-nodejs"));
        assert!(is_url_safe_slug("rust101"));
        assert!(!is_url_safe_slug(""));
        assert!(!is_url_safe_slug("Intro"));
        assert!(!is_url_safe_slug("double--hyphen"));
        assert!(!is_url_safe_slug("-leading"));
        assert!(!is_url_safe_slug("with space"));
    }

    #[test]
    fn test_course_input_validation() {
        let mut input = CourseInput::from_record(&record(Some(25.0), Some("USD")));
        assert!(input.validate().is_ok());

        input.price = Decimal::new(-1, 0);
        assert!(input.validate().is_err());

        input.price = Decimal::ZERO;
        input.title = "  ".to_string();
        assert_eq!(input.validate().unwrap_err(), "title cannot be empty");
    }

    #[test]
    fn test_order_wire_format() {
        let order = NewOrder {
            customer_name: "Ada".to_string(),
            customer_email: "ada@example.com".to_string(),
            amount: Decimal::new(4999, 2),
            currency: CurrencyCode::USD,
            status: OrderStatus::Completed,
            product_id: "ebook-pro".to_string(),
            tx_ref: "tx-1-abcdef12".to_string(),
            transaction_id: None,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["amount"], serde_json::json!(49.99));
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["status"], "completed");
        assert!(json.get("transaction_id").is_none());
    }

    #[test]
    fn test_claim_request_is_camel_case() {
        let claim = ClaimRequest {
            course_id: "c1".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
        };
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["courseId"], "c1");
        assert_eq!(json["email"], "ada@example.com");
    }
}
