//! Service wiring

use crate::analytics::AnalyticsService;
use crate::banner::BannerService;
use crate::cache::TagCache;
use crate::countries::CountryImporter;
use crate::memory::InMemoryStore;
use crate::permissions::PermissionEvaluator;
use crate::products::ProductService;
use crate::store::Store;
use crate::subscriptions::SubscriptionService;
use crate::users::UserService;
use std::sync::Arc;

/// All services over one store and one cache
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn Store>,
    pub cache: Arc<TagCache>,
    pub subscriptions: Arc<SubscriptionService>,
    pub permissions: Arc<PermissionEvaluator>,
    pub products: Arc<ProductService>,
    pub banner: Arc<BannerService>,
    pub analytics: Arc<AnalyticsService>,
    pub users: Arc<UserService>,
    pub countries: Arc<CountryImporter>,
}

impl Platform {
    /// `brand_url` is the target of the banner branding link
    pub fn new(store: Arc<dyn Store>, cache: TagCache, brand_url: impl Into<String>) -> Self {
        let cache = Arc::new(cache);
        let subscriptions = Arc::new(SubscriptionService::new(store.clone(), cache.clone()));
        let permissions = Arc::new(PermissionEvaluator::new(
            store.clone(),
            cache.clone(),
            subscriptions.clone(),
        ));

        Self {
            products: Arc::new(ProductService::new(
                store.clone(),
                cache.clone(),
                permissions.clone(),
            )),
            banner: Arc::new(BannerService::new(
                store.clone(),
                cache.clone(),
                permissions.clone(),
                brand_url,
            )),
            analytics: Arc::new(AnalyticsService::new(
                store.clone(),
                cache.clone(),
                permissions.clone(),
            )),
            users: Arc::new(UserService::new(store.clone(), cache.clone())),
            countries: Arc::new(CountryImporter::new(store.clone(), cache.clone())),
            subscriptions,
            permissions,
            store,
            cache,
        }
    }

    pub fn in_memory(brand_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), TagCache::default(), brand_url)
    }
}
