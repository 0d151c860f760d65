//! Local subscription rows

use crate::cache::{CacheKind, CacheTag, TagCache};
use crate::error::{ParityError, ParityResult};
use crate::model::{SubscriptionFilter, SubscriptionPatch, UserId, UserSubscription};
use crate::store::Store;
use crate::tiers::{SubscriptionTier, TierName};
use std::sync::Arc;

/// Subscription reads and writes, cache-aware
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<TagCache>) -> Self {
        Self { store, cache }
    }

    /// Insert unless the user already has one
    pub async fn create_user_subscription(
        &self,
        user: &UserId,
        tier: TierName,
    ) -> ParityResult<Option<UserSubscription>> {
        let created = self.store.insert_subscription_if_absent(user, tier).await?;
        if let Some(subscription) = &created {
            tracing::info!(user = %user, tier = %tier, "subscription created");
            self.cache.revalidate(
                CacheKind::Subscriptions,
                Some(&subscription.owner_id),
                Some(&subscription.id.to_string()),
            );
        }
        Ok(created)
    }

    pub async fn get_user_subscription(
        &self,
        user: &UserId,
    ) -> ParityResult<Option<UserSubscription>> {
        let tags = [CacheTag::user(user, CacheKind::Subscriptions)];
        self.cache
            .cached(format!("subscription:{user}"), &tags, || async {
                self.store.find_subscription(user).await.map_err(ParityError::from)
            })
            .await
    }

    pub async fn update_user_subscription(
        &self,
        filter: &SubscriptionFilter,
        patch: SubscriptionPatch,
    ) -> ParityResult<Option<UserSubscription>> {
        let updated = self.store.update_subscription(filter, patch).await?;
        match &updated {
            Some(subscription) => {
                tracing::info!(
                    user = %subscription.owner_id,
                    tier = %subscription.tier,
                    "subscription updated"
                );
                self.cache.revalidate(
                    CacheKind::Subscriptions,
                    Some(&subscription.owner_id),
                    Some(&subscription.id.to_string()),
                );
            }
            None => tracing::warn!(filter = ?filter, "subscription update matched no rows"),
        }
        Ok(updated)
    }

    /// Tier of the user's subscription
    pub async fn get_user_subscription_tier(
        &self,
        user: &UserId,
    ) -> ParityResult<&'static SubscriptionTier> {
        self.get_user_subscription(user)
            .await?
            .map(|s| s.tier.tier())
            .ok_or_else(|| ParityError::NoSubscription(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn service() -> SubscriptionService {
        SubscriptionService::new(Arc::new(InMemoryStore::new()), Arc::new(TagCache::default()))
    }

    #[tokio::test]
    async fn test_tier_requires_subscription() {
        let svc = service();
        let user = UserId::new("user_1");

        assert!(matches!(
            svc.get_user_subscription_tier(&user).await,
            Err(ParityError::NoSubscription(_))
        ));

        svc.create_user_subscription(&user, TierName::Free).await.unwrap();
        assert_eq!(svc.get_user_subscription_tier(&user).await.unwrap().name, TierName::Free);
    }

    #[tokio::test]
    async fn test_update_refreshes_cached_read() {
        let svc = service();
        let user = UserId::new("user_1");
        svc.create_user_subscription(&user, TierName::Free).await.unwrap();
        assert_eq!(svc.get_user_subscription(&user).await.unwrap().unwrap().tier, TierName::Free);

        svc.update_user_subscription(
            &SubscriptionFilter::Owner(user.clone()),
            SubscriptionPatch {
                tier: Some(TierName::Premium),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let subscription = svc.get_user_subscription(&user).await.unwrap().unwrap();
        assert_eq!(subscription.tier, TierName::Premium);
    }

    #[tokio::test]
    async fn test_create_after_miss_is_visible() {
        let svc = service();
        let user = UserId::new("user_2");

        assert!(svc.get_user_subscription(&user).await.unwrap().is_none());
        svc.create_user_subscription(&user, TierName::Basic).await.unwrap();
        assert!(svc.get_user_subscription(&user).await.unwrap().is_some());
    }
}
