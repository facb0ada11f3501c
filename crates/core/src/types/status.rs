//! Status enums for orders, payments, and courses.

use serde::{Deserialize, Serialize};

/// Status written on an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Payment confirmed and amounts agree.
    Completed,
    /// Payment confirmed, but the provider reported a different amount or
    /// currency than the product. Needs a human to look at it.
    UnderReview,
}

impl OrderStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::UnderReview => "under_review",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status reported by the payment widget callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    /// `"completed"` or `"successful"`.
    Succeeded,
    /// `"cancelled"`: the buyer closed the widget.
    Cancelled,
    /// Anything else, verbatim.
    Declined(String),
}

impl PaymentStatus {
    /// Classify a raw widget status (case-insensitive).
    #[must_use]
    pub fn from_widget(status: &str) -> Self {
        let normalized = status.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "completed" | "successful" => Self::Succeeded,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Declined(status.trim().to_string()),
        }
    }

    /// Whether money has moved.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Difficulty level of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

impl std::str::FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(format!("invalid course level: {s}")),
        }
    }
}
