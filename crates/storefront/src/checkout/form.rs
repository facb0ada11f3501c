//! Buyer details and payment widget configuration.

use chrono::{DateTime, Utc};
use learnfront_core::{CurrencyCode, CustomerRef, TxRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::PaymentWidgetSettings;

use super::{CheckoutError, Product};

/// A required buyer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuyerField {
    Name,
    Email,
    Phone,
}

impl BuyerField {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

/// Buyer details, as typed. Setters store values verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl BuyerInfo {
    pub fn set_name(&mut self, value: impl Into<String>) {
        self.name = value.into();
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.email = value.into();
    }

    pub fn set_phone(&mut self, value: impl Into<String>) {
        self.phone = value.into();
    }

    /// Fields that are empty or whitespace-only, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<BuyerField> {
        [
            (BuyerField::Name, &self.name),
            (BuyerField::Email, &self.email),
            (BuyerField::Phone, &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Every field is non-empty.
    #[must_use]
    pub fn is_ready_to_pay(&self) -> bool {
        [&self.name, &self.email, &self.phone]
            .iter()
            .all(|value| !value.trim().is_empty())
    }
}

/// Checkout form for one product.
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    product: Product,
    buyer: BuyerInfo,
}

impl CheckoutForm {
    #[must_use]
    pub fn new(product: Product) -> Self {
        Self {
            product,
            buyer: BuyerInfo::default(),
        }
    }

    #[must_use]
    pub const fn with_buyer(product: Product, buyer: BuyerInfo) -> Self {
        Self { product, buyer }
    }

    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    #[must_use]
    pub const fn buyer(&self) -> &BuyerInfo {
        &self.buyer
    }

    pub const fn buyer_mut(&mut self) -> &mut BuyerInfo {
        &mut self.buyer
    }

    #[must_use]
    pub fn is_ready_to_pay(&self) -> bool {
        self.buyer.is_ready_to_pay()
    }

    /// Build the widget configuration for a new attempt started at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::ValidationIncomplete`] listing the empty
    /// fields. No identifiers are generated in that case.
    pub fn payment_config(
        &self,
        settings: &PaymentWidgetSettings,
        now: DateTime<Utc>,
    ) -> Result<PaymentWidgetConfig, CheckoutError> {
        let missing = self.buyer.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::ValidationIncomplete { missing });
        }

        Ok(PaymentWidgetConfig {
            public_key: settings.public_key.clone(),
            tx_ref: TxRef::generate(now),
            amount: self.product.price.amount,
            currency: self.product.currency(),
            payment_options: settings.payment_options.clone(),
            customer: WidgetCustomer {
                id: CustomerRef::generate(),
                email: self.buyer.email.trim().to_string(),
                phone_number: self.buyer.phone.trim().to_string(),
                name: self.buyer.name.trim().to_string(),
            },
            customizations: WidgetCustomizations {
                title: self.product.title.clone(),
                description: format!("Payment for {}", self.product.title),
                logo: settings.logo_url.clone(),
            },
        })
    }
}

/// Configuration object handed to the inline payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentWidgetConfig {
    pub public_key: String,
    pub tx_ref: TxRef,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub payment_options: String,
    pub customer: WidgetCustomer,
    pub customizations: WidgetCustomizations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetCustomer {
    pub id: CustomerRef,
    pub email: String,
    pub phone_number: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetCustomizations {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checkout::EbookTier;

    fn settings() -> PaymentWidgetSettings {
        PaymentWidgetSettings {
            public_key: "FLWPUBK_TEST-abc-X".to_string(),
            payment_options: "card,mobilemoney,ussd".to_string(),
            logo_url: None,
        }
    }

    fn buyer(name: &str, email: &str, phone: &str) -> BuyerInfo {
        let mut buyer = BuyerInfo::default();
        buyer.set_name(name);
        buyer.set_email(email);
        buyer.set_phone(phone);
        buyer
    }

    #[test]
    fn test_ready_iff_all_fields_filled() {
        let values = ["", "   ", "x"];
        for name in values {
            for email in values {
                for phone in values {
                    let info = buyer(name, email, phone);
                    let all_filled = [name, email, phone].iter().all(|v| *v == "x");
                    assert_eq!(info.is_ready_to_pay(), all_filled, "{info:?}");
                    assert_eq!(info.missing_fields().is_empty(), all_filled);
                }
            }
        }
    }

    #[test]
    fn test_setters_store_verbatim() {
        let info = buyer(" Ada ", "not-an-email", "+234");
        assert_eq!(info.name, " Ada ");
        assert_eq!(info.email, "not-an-email");
    }

    #[test]
    fn test_incomplete_form_builds_no_config() {
        let form = CheckoutForm::with_buyer(
            Product::ebook(EbookTier::Pro),
            buyer("Ada", "", " "),
        );
        assert!(!form.is_ready_to_pay());
        assert_eq!(
            form.payment_config(&settings(), Utc::now()).unwrap_err(),
            CheckoutError::ValidationIncomplete {
                missing: vec![BuyerField::Email, BuyerField::Phone]
            }
        );
    }

    #[test]
    fn test_config_shape() {
        let mut form = CheckoutForm::new(Product::ebook(EbookTier::Pro));
        form.buyer_mut().set_name("Ada Lovelace ");
        form.buyer_mut().set_email("ada@example.com");
        form.buyer_mut().set_phone("08012345678");

        let now = Utc::now();
        let config = form.payment_config(&settings(), now).unwrap();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["public_key"], "FLWPUBK_TEST-abc-X");
        assert_eq!(json["amount"], serde_json::json!(49.99));
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["payment_options"], "card,mobilemoney,ussd");
        assert_eq!(json["customer"]["name"], "Ada Lovelace");
        assert_eq!(json["customer"]["phone_number"], "08012345678");
        assert_eq!(
            json["customizations"]["description"],
            "Payment for Node.js Performance Optimization (Pro)"
        );
        assert!(json["customizations"].get("logo").is_none());
        assert!(
            config
                .tx_ref
                .as_str()
                .starts_with(&format!("tx-{}-", now.timestamp_millis()))
        );
    }

    #[test]
    fn test_each_config_gets_fresh_identifiers() {
        let form = CheckoutForm::with_buyer(
            Product::ebook(EbookTier::Basic),
            buyer("Ada", "ada@example.com", "1"),
        );
        let now = Utc::now();
        let first = form.payment_config(&settings(), now).unwrap();
        let second = form.payment_config(&settings(), now).unwrap();
        assert_ne!(first.tx_ref, second.tx_ref);
        assert_ne!(first.customer.id, second.customer.id);
    }
}
