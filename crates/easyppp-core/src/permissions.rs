//! Tier-based permission checks
//!
//! Every check takes an optional user; an anonymous caller is always denied.

use crate::cache::{CacheKind, CacheTag, TagCache};
use crate::error::{ParityError, ParityResult};
use crate::model::UserId;
use crate::products::product_count;
use crate::store::Store;
use crate::subscriptions::SubscriptionService;
use crate::tiers::{SubscriptionTier, TierName};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Everything the dashboard gates on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionSet {
    pub tier: TierName,
    pub product_count: u64,
    pub product_limit: u64,
    pub monthly_views: u64,
    pub monthly_view_limit: u64,
    pub can_create_product: bool,
    pub can_customize_banner: bool,
    pub can_remove_branding: bool,
    pub can_access_analytics: bool,
    pub can_show_discount_banner: bool,
}

/// Start of the current UTC month
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub struct PermissionEvaluator {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
    subscriptions: Arc<SubscriptionService>,
}

impl PermissionEvaluator {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<TagCache>,
        subscriptions: Arc<SubscriptionService>,
    ) -> Self {
        Self {
            store,
            cache,
            subscriptions,
        }
    }

    async fn tier_flag(
        &self,
        user: Option<&UserId>,
        flag: fn(&SubscriptionTier) -> bool,
    ) -> ParityResult<bool> {
        match user {
            Some(user) => Ok(flag(self.subscriptions.get_user_subscription_tier(user).await?)),
            None => Ok(false),
        }
    }

    pub async fn can_create_product(&self, user: Option<&UserId>) -> ParityResult<bool> {
        let Some(user) = user else { return Ok(false) };
        let tier = self.subscriptions.get_user_subscription_tier(user).await?;
        let count = product_count(&self.store, &self.cache, user).await?;
        Ok(count < tier.max_number_of_products)
    }

    pub async fn can_customize_banner(&self, user: Option<&UserId>) -> ParityResult<bool> {
        self.tier_flag(user, |t| t.can_customize_banner).await
    }

    pub async fn can_remove_branding(&self, user: Option<&UserId>) -> ParityResult<bool> {
        self.tier_flag(user, |t| t.can_remove_branding).await
    }

    pub async fn can_access_analytics(&self, user: Option<&UserId>) -> ParityResult<bool> {
        self.tier_flag(user, |t| t.can_access_analytics).await
    }

    /// Monthly banner views still under the tier limit
    pub async fn can_show_discount_banner(&self, user: Option<&UserId>) -> ParityResult<bool> {
        let Some(user) = user else { return Ok(false) };
        let tier = self.subscriptions.get_user_subscription_tier(user).await?;
        let views = self.monthly_views(user).await?;
        Ok(views < tier.max_number_of_visits)
    }

    /// Views of the user's products since the start of the month
    pub async fn monthly_views(&self, user: &UserId) -> ParityResult<u64> {
        let since = start_of_month(Utc::now());
        let tags = [CacheTag::user(user, CacheKind::ProductViews)];
        self.cache
            .cached(format!("views:month:{user}:{}", since.format("%Y-%m")), &tags, || async {
                self.store
                    .count_views_since(user, since)
                    .await
                    .map_err(ParityError::from)
            })
            .await
    }

    /// All flags at once
    pub async fn permission_set(&self, user: &UserId) -> ParityResult<PermissionSet> {
        let tier = self.subscriptions.get_user_subscription_tier(user).await?;
        let count = product_count(&self.store, &self.cache, user).await?;
        let views = self.monthly_views(user).await?;

        Ok(PermissionSet {
            tier: tier.name,
            product_count: count,
            product_limit: tier.max_number_of_products,
            monthly_views: views,
            monthly_view_limit: tier.max_number_of_visits,
            can_create_product: count < tier.max_number_of_products,
            can_customize_banner: tier.can_customize_banner,
            can_remove_branding: tier.can_remove_branding,
            can_access_analytics: tier.can_access_analytics,
            can_show_discount_banner: views < tier.max_number_of_visits,
        })
    }
}
