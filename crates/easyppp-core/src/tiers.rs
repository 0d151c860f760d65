//! Subscription tiers and feature gating

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Subscription tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierName {
    Free,
    Basic,
    Standard,
    Premium,
}

impl TierName {
    pub const ALL: [TierName; 4] = [Self::Free, Self::Basic, Self::Standard, Self::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Standard => "Standard",
            Self::Premium => "Premium",
        }
    }

    /// Limits and flags for this tier
    pub fn tier(&self) -> &'static SubscriptionTier {
        match self {
            Self::Free => &FREE,
            Self::Basic => &BASIC,
            Self::Standard => &STANDARD,
            Self::Premium => &PREMIUM,
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierName {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTier(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown tier: {0}")]
pub struct UnknownTier(pub String);

/// What a tier grants
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubscriptionTier {
    pub name: TierName,
    pub price_in_cents: u32,
    pub max_number_of_products: u64,
    pub max_number_of_visits: u64,
    pub can_access_analytics: bool,
    pub can_customize_banner: bool,
    pub can_remove_branding: bool,
}

static FREE: SubscriptionTier = SubscriptionTier {
    name: TierName::Free,
    price_in_cents: 0,
    max_number_of_products: 1,
    max_number_of_visits: 5_000,
    can_access_analytics: false,
    can_customize_banner: false,
    can_remove_branding: false,
};

static BASIC: SubscriptionTier = SubscriptionTier {
    name: TierName::Basic,
    price_in_cents: 1_900,
    max_number_of_products: 1,
    max_number_of_visits: 10_000,
    can_access_analytics: true,
    can_customize_banner: false,
    can_remove_branding: false,
};

static STANDARD: SubscriptionTier = SubscriptionTier {
    name: TierName::Standard,
    price_in_cents: 4_900,
    max_number_of_products: 5,
    max_number_of_visits: 100_000,
    can_access_analytics: true,
    can_customize_banner: true,
    can_remove_branding: true,
};

static PREMIUM: SubscriptionTier = SubscriptionTier {
    name: TierName::Premium,
    price_in_cents: 9_900,
    max_number_of_products: 10,
    max_number_of_visits: 1_000_000,
    can_access_analytics: true,
    can_customize_banner: true,
    can_remove_branding: true,
};

/// Tiers in display order
pub fn all_tiers() -> Vec<&'static SubscriptionTier> {
    TierName::ALL.iter().map(|t| t.tier()).collect()
}

/// Billing price id <-> paid tier mapping
#[derive(Clone, Debug, Default)]
pub struct PriceCatalog {
    by_price: HashMap<String, TierName>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a price id; Free is never billable and is skipped
    pub fn with_price(mut self, tier: TierName, price_id: impl Into<String>) -> Self {
        let price_id = price_id.into();
        if tier != TierName::Free && !price_id.is_empty() {
            self.by_price.insert(price_id, tier);
        }
        self
    }

    pub fn tier_for_price(&self, price_id: &str) -> Option<TierName> {
        self.by_price.get(price_id).copied()
    }

    pub fn price_for_tier(&self, tier: TierName) -> Option<&str> {
        self.by_price
            .iter()
            .find(|(_, t)| **t == tier)
            .map(|(p, _)| p.as_str())
    }
}
