//! Server settings
//!
//! Layered lowest priority first: built-in defaults, optional TOML file,
//! then `EASYPPP__SECTION__KEY` environment variables.

use ::config::{Config, ConfigError, Environment, File};
use easyppp_core::{PriceCatalog, TierName};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub webhooks: WebhookSettings,
    pub billing: BillingSettings,
    pub banner: BannerSettings,
    pub cache: CacheSettings,
    pub data: DataSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Base url used in embed codes and the banner branding link
    pub public_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            public_url: "http://localhost:8080".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    /// `whsec_<base64>`
    pub identity_secret: String,
    pub billing_secret: String,
    pub tolerance_secs: i64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            identity_secret: String::new(),
            billing_secret: String::new(),
            tolerance_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub api_base: String,
    pub secret_key: String,
    pub basic_price_id: String,
    pub standard_price_id: String,
    pub premium_price_id: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".into(),
            secret_key: String::new(),
            basic_price_id: String::new(),
            standard_price_id: String::new(),
            premium_price_id: String::new(),
        }
    }
}

impl BillingSettings {
    pub fn price_catalog(&self) -> PriceCatalog {
        PriceCatalog::new()
            .with_price(TierName::Basic, &self.basic_price_id)
            .with_price(TierName::Standard, &self.standard_price_id)
            .with_price(TierName::Premium, &self.premium_price_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BannerSettings {
    /// Header carrying the visitor's country code
    pub country_header: String,
    /// Used when the header is absent (local development)
    pub test_country_code: Option<String>,
}

impl Default for BannerSettings {
    fn default() -> Self {
        Self {
            country_header: "x-vercel-ip-country".into(),
            test_country_code: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_secs: 3600,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Country groups dataset; the bundled one is used when unset
    pub country_groups_path: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("EASYPPP")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.banner.country_header, "x-vercel-ip-country");
        assert_eq!(settings.webhooks.tolerance_secs, 300);
        assert_eq!(settings.cache.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_price_catalog_skips_unset() {
        let billing = BillingSettings {
            standard_price_id: "price_std".into(),
            ..Default::default()
        };
        let catalog = billing.price_catalog();
        assert_eq!(catalog.tier_for_price("price_std"), Some(TierName::Standard));
        assert_eq!(catalog.price_for_tier(TierName::Basic), None);
    }
}
