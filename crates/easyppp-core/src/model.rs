//! Domain model
//!
//! Rows owned by the service. Percentages are stored as fractions
//! (`0.25` means 25% off).

use crate::tiers::TierName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Product identifier
pub type ProductId = Uuid;
/// Country group identifier
pub type CountryGroupId = Uuid;
/// Country identifier
pub type CountryId = Uuid;
/// Subscription identifier
pub type SubscriptionId = Uuid;

/// Identity provider user id (opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a provider id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Registered product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub owner_id: UserId,
    pub name: String,
    /// Stored without trailing slash
    pub url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by create/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub owner_id: UserId,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
}

/// Banner look and message, 1:1 with a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCustomization {
    pub product_id: ProductId,
    pub class_prefix: Option<String>,
    pub location_message: String,
    pub background_color: String,
    pub text_color: String,
    pub font_size: String,
    pub banner_container: String,
    pub is_sticky: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default banner message; `{country}`, `{coupon}` and `{discount}` are substituted
pub const DEFAULT_LOCATION_MESSAGE: &str = "Hey! It looks like you are from <b>{country}</b>. We support Parity Purchasing Power, so if you need it, use code <b>\u{201c}{coupon}\u{201d}</b> to get <b>{discount}%</b> off.";

impl ProductCustomization {
    /// Default customization created alongside a product
    pub fn default_for(product_id: ProductId) -> Self {
        let now = Utc::now();
        Self {
            product_id,
            class_prefix: None,
            location_message: DEFAULT_LOCATION_MESSAGE.into(),
            background_color: "hsl(193, 82%, 31%)".into(),
            text_color: "hsl(0, 0%, 100%)".into(),
            font_size: "1rem".into(),
            banner_container: "body".into(),
            is_sticky: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Group of countries sharing an economic tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryGroup {
    pub id: CountryGroupId,
    pub name: String,
    pub recommended_discount_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Country row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryId,
    pub name: String,
    /// ISO 3166-1 alpha-2, upper case
    pub code: String,
    pub country_group_id: CountryGroupId,
}

/// Group with its member countries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryGroupWithCountries {
    pub group: CountryGroup,
    pub countries: Vec<Country>,
}

/// Per-product override for one country group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryGroupDiscount {
    pub product_id: ProductId,
    pub country_group_id: CountryGroupId,
    pub coupon: String,
    pub discount_percentage: f64,
}

/// Local mirror of the billing subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub owner_id: UserId,
    pub tier: TierName,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub billing_subscription_item_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which subscription rows an update targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionFilter {
    Owner(UserId),
    BillingCustomer(String),
}

/// Partial subscription update; `Some(None)` clears a field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPatch {
    pub tier: Option<TierName>,
    pub billing_customer_id: Option<Option<String>>,
    pub billing_subscription_id: Option<Option<String>>,
    pub billing_subscription_item_id: Option<Option<String>>,
}

/// One banner impression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: Uuid,
    pub product_id: ProductId,
    pub country_id: Option<CountryId>,
    pub visited_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_customization() {
        let id = Uuid::new_v4();
        let c = ProductCustomization::default_for(id);

        assert_eq!(c.product_id, id);
        assert!(c.is_sticky);
        assert_eq!(c.banner_container, "body");
        assert!(c.location_message.contains("{coupon}"));
    }

    #[test]
    fn test_user_id_serializes_transparently() {
        let id = UserId::new("user_2abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user_2abc\"");
    }
}
