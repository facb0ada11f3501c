//! Newtype IDs for type-safe entity references.
//!
//! Backend records are keyed by opaque strings, so the `define_id!` wrappers
//! hold a `String` rather than a number. Checkout identifiers ([`TxRef`],
//! [`CustomerRef`]) are generated locally.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe opaque string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use learnfront_core::define_id;
/// define_id!(LessonId);
/// define_id!(ModuleId);
///
/// let lesson_id = LessonId::new("abc");
/// let module_id = ModuleId::new("abc");
///
/// // These are different types, so this won't compile:
/// // let _: LessonId = module_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

define_id!(OrderId);

/// Transaction reference handed to the payment widget.
///
/// Tied to the creation timestamp, with a short random suffix so two
/// checkouts started in the same millisecond do not collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    /// Generate a reference for a checkout started at `now`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Self(format!("tx-{}-{suffix}", now.timestamp_millis()))
    }

    /// Wrap a reference received from the payment widget.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque customer identifier embedded in the payment configuration.
///
/// Used for display and tracing only; it is not a security token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRef(Uuid);

impl CustomerRef {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CustomerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_tx_ref_embeds_timestamp() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).single();
        let Some(now) = now else {
            panic!("valid timestamp");
        };
        let tx_ref = TxRef::generate(now);
        assert!(tx_ref.as_str().starts_with("tx-1700000000123-"));
        assert_eq!(tx_ref.as_str().len(), "tx-1700000000123-".len() + 8);
    }

    #[test]
    fn test_tx_refs_do_not_collide_within_a_millisecond() {
        let now = Utc::now();
        assert_ne!(TxRef::generate(now), TxRef::generate(now));
    }

    #[test]
    fn test_customer_refs_are_unique() {
        assert_ne!(CustomerRef::generate(), CustomerRef::generate());
    }

    #[test]
    fn test_order_id_is_transparent() {
        let id = OrderId::new("65f1c0ffee");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"65f1c0ffee\""));
        assert_eq!(id.to_string(), "65f1c0ffee");
    }
}
