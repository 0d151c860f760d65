//! User removal

use crate::cache::{CacheKind, TagCache};
use crate::error::ParityResult;
use crate::model::UserId;
use crate::store::{DeletedUserData, Store};
use std::sync::Arc;

pub struct UserService {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<TagCache>) -> Self {
        Self { store, cache }
    }

    /// Drop the user's subscriptions and products
    pub async fn delete_user(&self, user: &UserId) -> ParityResult<DeletedUserData> {
        let deleted = self.store.delete_user_data(user).await?;

        for id in &deleted.subscriptions {
            let id = id.to_string();
            self.cache.revalidate(CacheKind::Subscriptions, Some(user), Some(&id));
            self.cache.retire(CacheKind::Subscriptions, &id);
        }
        for id in &deleted.products {
            let id = id.to_string();
            self.cache.revalidate(CacheKind::Products, Some(user), Some(&id));
            self.cache.retire(CacheKind::Products, &id);
        }
        self.cache.revalidate(CacheKind::ProductViews, Some(user), None);

        tracing::info!(
            user = %user,
            subscriptions = deleted.subscriptions.len(),
            products = deleted.products.len(),
            "user data deleted"
        );
        Ok(deleted)
    }
}
