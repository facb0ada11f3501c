//! Slug to product resolution.
//!
//! Slugs starting with `ebook-` name a fixed-price ebook tier; every other
//! slug is looked up in the catalog. Resolution never fails: anything that
//! prevents a sale comes back as [`Resolution::NotFound`] with a reason.

use std::fmt;

use learnfront_core::{CurrencyCode, Price};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::backend::{CatalogGateway, CourseRecord};

const EBOOK_PREFIX: &str = "ebook-";
const EBOOK_TITLE: &str = "Node.js Performance Optimization";

/// Fixed ebook purchase packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EbookTier {
    Basic,
    Pro,
    Premium,
}

impl EbookTier {
    pub const ALL: [Self; 3] = [Self::Basic, Self::Pro, Self::Premium];

    /// Tier named by the part of the slug after `ebook-`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(Self::Basic),
            "pro" => Some(Self::Pro),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Pro => "Pro",
            Self::Premium => "Premium",
        }
    }

    /// Static price table. Ebooks are always sold in USD.
    #[must_use]
    pub const fn price(&self) -> Price {
        let amount = match self {
            Self::Basic => Decimal::from_parts(2999, 0, 0, false, 2),
            Self::Pro => Decimal::from_parts(4999, 0, 0, false, 2),
            Self::Premium => Decimal::from_parts(9999, 0, 0, false, 2),
        };
        Price::new(amount, CurrencyCode::USD)
    }

    /// Route slug for this tier.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{EBOOK_PREFIX}{}", self.as_str())
    }
}

/// What a checkout slug refers to, before any lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseTarget {
    /// `ebook-<tier>` with a known tier.
    EbookTier(EbookTier),
    /// `ebook-<tier>` with a tier that does not exist.
    UnknownEbookTier(String),
    /// Anything else; resolved against the catalog.
    CourseLookup(String),
}

impl PurchaseTarget {
    #[must_use]
    pub fn classify(slug: &str) -> Self {
        match slug.strip_prefix(EBOOK_PREFIX) {
            Some(name) => EbookTier::from_name(name)
                .map_or_else(|| Self::UnknownEbookTier(name.to_string()), Self::EbookTier),
            None => Self::CourseLookup(slug.to_string()),
        }
    }
}

/// Where a product came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductKind {
    Ebook { tier: EbookTier },
    Course { slug: String },
}

/// A purchasable product. Always carries a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: Price,
    pub kind: ProductKind,
}

impl Product {
    #[must_use]
    pub fn ebook(tier: EbookTier) -> Self {
        Self {
            id: tier.slug(),
            title: format!("{EBOOK_TITLE} ({})", tier.label()),
            price: tier.price(),
            kind: ProductKind::Ebook { tier },
        }
    }

    /// Build a product from a catalog record; `None` if it has no usable price.
    #[must_use]
    pub fn from_course(record: &CourseRecord) -> Option<Self> {
        Some(Self {
            id: record.id.clone(),
            title: record.title.clone(),
            price: record.price()?,
            kind: ProductKind::Course {
                slug: record.slug.clone(),
            },
        })
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.price.currency_code
    }
}

/// Why a slug did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// No such ebook tier or course.
    Missing,
    /// The course exists but has no valid price or currency.
    Unpriced,
    /// The catalog could not be reached or answered garbage.
    LookupFailed,
}

impl NotFoundReason {
    /// Whether trying again later might succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::LookupFailed)
    }
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "missing",
            Self::Unpriced => "unpriced",
            Self::LookupFailed => "lookup failed",
        })
    }
}

/// Outcome of resolving a slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Product),
    NotFound { reason: NotFoundReason },
}

impl Resolution {
    #[must_use]
    pub fn product(&self) -> Option<&Product> {
        match self {
            Self::Found(product) => Some(product),
            Self::NotFound { .. } => None,
        }
    }
}

/// Resolve a route slug to a product.
///
/// Ebook tiers never touch the catalog. Catalog failures are logged and
/// reported as `NotFound { reason: LookupFailed }`.
#[instrument(skip(catalog), fields(slug = %slug))]
pub async fn resolve<C: CatalogGateway>(catalog: &C, slug: &str) -> Resolution {
    let slug = match PurchaseTarget::classify(slug) {
        PurchaseTarget::EbookTier(tier) => return Resolution::Found(Product::ebook(tier)),
        PurchaseTarget::UnknownEbookTier(_) => {
            return Resolution::NotFound {
                reason: NotFoundReason::Missing,
            };
        }
        PurchaseTarget::CourseLookup(slug) => slug,
    };

    match catalog.course_by_slug(&slug).await {
        Ok(Some(record)) => Product::from_course(&record).map_or_else(
            || {
                warn!(course_id = %record.id, "Course has no usable price");
                Resolution::NotFound {
                    reason: NotFoundReason::Unpriced,
                }
            },
            Resolution::Found,
        ),
        Ok(None) => Resolution::NotFound {
            reason: NotFoundReason::Missing,
        },
        Err(e) => {
            warn!(error = %e, "Course lookup failed");
            Resolution::NotFound {
                reason: NotFoundReason::LookupFailed,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::backend::BackendError;

    use super::*;

    /// In-memory catalog that counts lookups.
    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub courses: HashMap<String, CourseRecord>,
        pub fail: bool,
        pub lookups: AtomicUsize,
    }

    pub(crate) fn course(slug: &str, price: Option<f64>, currency: Option<&str>) -> CourseRecord {
        CourseRecord {
            id: format!("id-{slug}"),
            title: format!("Course {slug}"),
            description: String::new(),
            price,
            currency: currency.map(str::to_string),
            instructor: "Ada".to_string(),
            level: "beginner".to_string(),
            slug: slug.to_string(),
            duration: "2h".to_string(),
            preview_content: String::new(),
            preview_images: vec![],
        }
    }

    impl FakeCatalog {
        pub(crate) fn with(courses: impl IntoIterator<Item = CourseRecord>) -> Self {
            Self {
                courses: courses.into_iter().map(|c| (c.slug.clone(), c)).collect(),
                ..Self::default()
            }
        }
    }

    impl CatalogGateway for FakeCatalog {
        async fn course_by_slug(&self, slug: &str) -> Result<Option<CourseRecord>, BackendError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::Timeout);
            }
            Ok(self.courses.get(slug).cloned())
        }

        async fn list_courses(&self) -> Result<Vec<CourseRecord>, BackendError> {
            if self.fail {
                return Err(BackendError::Timeout);
            }
            Ok(self.courses.values().cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_ebook_tiers_use_static_prices() {
        let catalog = FakeCatalog::default();
        let expected = [("basic", 2999), ("pro", 4999), ("premium", 9999)];

        for (name, cents) in expected {
            let resolution = resolve(&catalog, &format!("ebook-{name}")).await;
            let Resolution::Found(product) = resolution else {
                panic!("ebook-{name} should resolve");
            };
            assert_eq!(product.price.amount, Decimal::new(cents, 2));
            assert_eq!(product.currency().as_str(), "USD");
            assert_eq!(product.id, format!("ebook-{name}"));
        }
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_ebook_tier_skips_catalog() {
        let catalog = FakeCatalog::default();
        assert_eq!(
            resolve(&catalog, "ebook-deluxe").await,
            Resolution::NotFound {
                reason: NotFoundReason::Missing
            }
        );
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_course_is_not_found() {
        let catalog = FakeCatalog::default();
        assert_eq!(
            resolve(&catalog, "intro-to-nodejs").await,
            Resolution::NotFound {
                reason: NotFoundReason::Missing
            }
        );
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_found() {
        let catalog = FakeCatalog {
            fail: true,
            ..FakeCatalog::default()
        };
        let resolution = resolve(&catalog, "intro-to-nodejs").await;
        assert_eq!(
            resolution,
            Resolution::NotFound {
                reason: NotFoundReason::LookupFailed
            }
        );
    }

    #[tokio::test]
    async fn test_unpriced_course_is_not_found() {
        let catalog = FakeCatalog::with([
            course("no-price", None, Some("USD")),
            course("no-currency", Some(10.0), None),
        ]);
        for slug in ["no-price", "no-currency"] {
            assert_eq!(
                resolve(&catalog, slug).await,
                Resolution::NotFound {
                    reason: NotFoundReason::Unpriced
                }
            );
        }
    }

    #[tokio::test]
    async fn test_priced_course_resolves() {
        let catalog = FakeCatalog::with([course("rust-101", Some(25000.0), Some("NGN"))]);
        let resolution = resolve(&catalog, "rust-101").await;
        let product = resolution.product().cloned();
        let Some(product) = product else {
            panic!("rust-101 should resolve");
        };
        assert_eq!(product.id, "id-rust-101");
        assert_eq!(product.price.to_string(), "₦25000.00");
        assert_eq!(
            product.kind,
            ProductKind::Course {
                slug: "rust-101".to_string()
            }
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            PurchaseTarget::classify("ebook-pro"),
            PurchaseTarget::EbookTier(EbookTier::Pro)
        );
        assert_eq!(
            PurchaseTarget::classify("ebook-"),
            PurchaseTarget::UnknownEbookTier(String::new())
        );
        assert_eq!(
            PurchaseTarget::classify("ebooks-guide"),
            PurchaseTarget::CourseLookup("ebooks-guide".to_string())
        );
    }

    #[test]
    fn test_ebook_title() {
        assert_eq!(
            Product::ebook(EbookTier::Pro).title,
            "Node.js Performance Optimization (Pro)"
        );
    }
}
