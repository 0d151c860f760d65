//! In-memory store (development and tests)

use crate::model::*;
use crate::store::*;
use crate::tiers::TierName;
use crate::validation::{CustomizationUpdate, ProductDetails};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    customizations: HashMap<ProductId, ProductCustomization>,
    groups: HashMap<CountryGroupId, CountryGroup>,
    countries: HashMap<CountryId, Country>,
    discounts: HashMap<(ProductId, CountryGroupId), CountryGroupDiscount>,
    subscriptions: HashMap<SubscriptionId, UserSubscription>,
    views: Vec<ProductView>,
}

impl Tables {
    fn drop_product(&mut self, id: ProductId) {
        self.products.remove(&id);
        self.customizations.remove(&id);
        self.discounts.retain(|(product_id, _), _| *product_id != id);
        self.views.retain(|v| v.product_id != id);
    }

    fn owned_product_ids(&self, owner: &UserId) -> Vec<ProductId> {
        self.products
            .values()
            .filter(|p| &p.owner_id == owner)
            .map(|p| p.id)
            .collect()
    }
}

/// Single-lock store; every method is atomic
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    fail_customization_inserts: std::sync::atomic::AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            #[cfg(test)]
            fail_customization_inserts: std::sync::atomic::AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_customization_inserts(&self, fail: bool) {
        self.fail_customization_inserts
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of stored products across all owners
    pub fn product_total(&self) -> usize {
        self.tables.read().products.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            owner_id: product.owner_id,
            name: product.name,
            url: product.url,
            description: product.description,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_customization_if_absent(
        &self,
        customization: ProductCustomization,
    ) -> StoreResult<()> {
        #[cfg(test)]
        if self
            .fail_customization_inserts
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StoreError::Backend("customization insert failed".into()));
        }

        let mut tables = self.tables.write();
        if !tables.products.contains_key(&customization.product_id) {
            return Err(StoreError::NotFound(format!("product {}", customization.product_id)));
        }
        tables
            .customizations
            .entry(customization.product_id)
            .or_insert(customization);
        Ok(())
    }

    async fn find_product(&self, owner: &UserId, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self
            .tables
            .read()
            .products
            .get(&id)
            .filter(|p| &p.owner_id == owner)
            .cloned())
    }

    async fn find_product_by_url(&self, id: ProductId, url: &str) -> StoreResult<Option<Product>> {
        Ok(self
            .tables
            .read()
            .products
            .get(&id)
            .filter(|p| p.url == url)
            .cloned())
    }

    async fn list_products(
        &self,
        owner: &UserId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Product>> {
        let mut products: Vec<_> = self
            .tables
            .read()
            .products
            .values()
            .filter(|p| &p.owner_id == owner)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            products.truncate(limit);
        }
        Ok(products)
    }

    async fn count_products(&self, owner: &UserId) -> StoreResult<u64> {
        Ok(self.tables.read().owned_product_ids(owner).len() as u64)
    }

    async fn update_product(
        &self,
        owner: &UserId,
        id: ProductId,
        details: ProductDetails,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.products.get_mut(&id).filter(|p| &p.owner_id == owner) {
            Some(product) => {
                product.name = details.name;
                product.url = details.url;
                product.description = details.description;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, owner: &UserId, id: ProductId) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let owned = tables
            .products
            .get(&id)
            .map(|p| &p.owner_id == owner)
            .unwrap_or(false);
        if owned {
            tables.drop_product(id);
        }
        Ok(owned)
    }

    async fn get_customization(
        &self,
        product_id: ProductId,
    ) -> StoreResult<Option<ProductCustomization>> {
        Ok(self.tables.read().customizations.get(&product_id).cloned())
    }

    async fn update_customization(
        &self,
        product_id: ProductId,
        update: CustomizationUpdate,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.customizations.get_mut(&product_id) {
            Some(c) => {
                c.class_prefix = update.class_prefix;
                c.background_color = update.background_color;
                c.text_color = update.text_color;
                c.font_size = update.font_size;
                c.location_message = update.location_message;
                c.banner_container = update.banner_container;
                c.is_sticky = update.is_sticky;
                c.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CountryRepository for InMemoryStore {
    async fn list_country_groups(&self) -> StoreResult<Vec<CountryGroupWithCountries>> {
        let tables = self.tables.read();
        let mut groups: Vec<_> = tables
            .groups
            .values()
            .map(|group| {
                let mut countries: Vec<_> = tables
                    .countries
                    .values()
                    .filter(|c| c.country_group_id == group.id)
                    .cloned()
                    .collect();
                countries.sort_by(|a, b| a.name.cmp(&b.name));
                CountryGroupWithCountries {
                    group: group.clone(),
                    countries,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.group.name.cmp(&b.group.name));
        Ok(groups)
    }

    async fn find_country_by_code(&self, code: &str) -> StoreResult<Option<Country>> {
        Ok(self
            .tables
            .read()
            .countries
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn discounts_for_product(
        &self,
        product_id: ProductId,
    ) -> StoreResult<Vec<CountryGroupDiscount>> {
        Ok(self
            .tables
            .read()
            .discounts
            .values()
            .filter(|d| d.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn apply_discount_changes(
        &self,
        product_id: ProductId,
        deletes: &[CountryGroupId],
        upserts: Vec<CountryGroupDiscount>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.products.contains_key(&product_id) {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }
        let unknown = upserts
            .iter()
            .find(|d| !tables.groups.contains_key(&d.country_group_id));
        if let Some(bad) = unknown {
            return Err(StoreError::Conflict(format!(
                "unknown country group {}",
                bad.country_group_id
            )));
        }

        for group_id in deletes {
            tables.discounts.remove(&(product_id, *group_id));
        }
        for discount in upserts {
            tables
                .discounts
                .insert((product_id, discount.country_group_id), discount);
        }
        Ok(())
    }

    async fn upsert_country_groups(&self, groups: Vec<NewCountryGroup>) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let mut affected = 0;
        for new in groups {
            match tables.groups.values_mut().find(|g| g.name == new.name) {
                Some(existing) => {
                    existing.recommended_discount_percentage = new.recommended_discount_percentage;
                }
                None => {
                    let group = CountryGroup {
                        id: Uuid::new_v4(),
                        name: new.name,
                        recommended_discount_percentage: new.recommended_discount_percentage,
                        created_at: Utc::now(),
                    };
                    tables.groups.insert(group.id, group);
                }
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn upsert_countries(&self, countries: Vec<NewCountry>) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let mut affected = 0;
        for new in countries {
            if !tables.groups.contains_key(&new.country_group_id) {
                return Err(StoreError::Conflict(format!(
                    "unknown country group {}",
                    new.country_group_id
                )));
            }
            match tables.countries.values_mut().find(|c| c.code == new.code) {
                Some(existing) => {
                    existing.name = new.name;
                    existing.country_group_id = new.country_group_id;
                }
                None => {
                    let country = Country {
                        id: Uuid::new_v4(),
                        name: new.name,
                        code: new.code,
                        country_group_id: new.country_group_id,
                    };
                    tables.countries.insert(country.id, country);
                }
            }
            affected += 1;
        }
        Ok(affected)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn insert_subscription_if_absent(
        &self,
        owner: &UserId,
        tier: TierName,
    ) -> StoreResult<Option<UserSubscription>> {
        let mut tables = self.tables.write();
        if tables.subscriptions.values().any(|s| &s.owner_id == owner) {
            return Ok(None);
        }
        let now = Utc::now();
        let subscription = UserSubscription {
            id: Uuid::new_v4(),
            owner_id: owner.clone(),
            tier,
            billing_customer_id: None,
            billing_subscription_id: None,
            billing_subscription_item_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.insert(subscription.id, subscription.clone());
        Ok(Some(subscription))
    }

    async fn find_subscription(&self, owner: &UserId) -> StoreResult<Option<UserSubscription>> {
        Ok(self
            .tables
            .read()
            .subscriptions
            .values()
            .find(|s| &s.owner_id == owner)
            .cloned())
    }

    async fn update_subscription(
        &self,
        filter: &SubscriptionFilter,
        patch: SubscriptionPatch,
    ) -> StoreResult<Option<UserSubscription>> {
        let mut tables = self.tables.write();
        let row = tables.subscriptions.values_mut().find(|s| match filter {
            SubscriptionFilter::Owner(owner) => &s.owner_id == owner,
            SubscriptionFilter::BillingCustomer(customer) => {
                s.billing_customer_id.as_deref() == Some(customer.as_str())
            }
        });

        let Some(row) = row else {
            return Ok(None);
        };
        if let Some(tier) = patch.tier {
            row.tier = tier;
        }
        if let Some(customer) = patch.billing_customer_id {
            row.billing_customer_id = customer;
        }
        if let Some(subscription) = patch.billing_subscription_id {
            row.billing_subscription_id = subscription;
        }
        if let Some(item) = patch.billing_subscription_item_id {
            row.billing_subscription_item_id = item;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_user_data(&self, owner: &UserId) -> StoreResult<DeletedUserData> {
        let mut tables = self.tables.write();

        let subscriptions: Vec<_> = tables
            .subscriptions
            .values()
            .filter(|s| &s.owner_id == owner)
            .map(|s| s.id)
            .collect();
        for id in &subscriptions {
            tables.subscriptions.remove(id);
        }

        let products = tables.owned_product_ids(owner);
        for id in &products {
            tables.drop_product(*id);
        }

        Ok(DeletedUserData { subscriptions, products })
    }
}

#[async_trait]
impl ViewRepository for InMemoryStore {
    async fn record_view(
        &self,
        product_id: ProductId,
        country_id: Option<CountryId>,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.products.contains_key(&product_id) {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }
        tables.views.push(ProductView {
            id: Uuid::new_v4(),
            product_id,
            country_id,
            visited_at: at,
        });
        Ok(())
    }

    async fn count_views_since(&self, owner: &UserId, since: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.views_since(owner, since, None).await?.len() as u64)
    }

    async fn views_since(
        &self,
        owner: &UserId,
        since: DateTime<Utc>,
        product: Option<ProductId>,
    ) -> StoreResult<Vec<ProductView>> {
        let tables = self.tables.read();
        Ok(tables
            .views
            .iter()
            .filter(|v| v.visited_at >= since)
            .filter(|v| product.map_or(true, |p| p == v.product_id))
            .filter(|v| {
                tables
                    .products
                    .get(&v.product_id)
                    .map_or(false, |p| &p.owner_id == owner)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(owner: &str, name: &str) -> NewProduct {
        NewProduct {
            owner_id: UserId::new(owner),
            name: name.into(),
            url: "https://shop.dev".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_product_scoping_and_cascade() {
        let store = InMemoryStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let product = store.insert_product(new_product("alice", "Course")).await.unwrap();
        store
            .insert_customization_if_absent(ProductCustomization::default_for(product.id))
            .await
            .unwrap();
        store.record_view(product.id, None, Utc::now()).await.unwrap();

        assert!(store.find_product(&bob, product.id).await.unwrap().is_none());
        assert!(!store.delete_product(&bob, product.id).await.unwrap());

        assert!(store.delete_product(&alice, product.id).await.unwrap());
        assert!(store.get_customization(product.id).await.unwrap().is_none());
        assert_eq!(store.count_views_since(&alice, DateTime::<Utc>::MIN_UTC).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_customization_insert_is_idempotent() {
        let store = InMemoryStore::new();
        let product = store.insert_product(new_product("a", "Course")).await.unwrap();

        let mut first = ProductCustomization::default_for(product.id);
        first.font_size = "2rem".into();
        store.insert_customization_if_absent(first).await.unwrap();
        store
            .insert_customization_if_absent(ProductCustomization::default_for(product.id))
            .await
            .unwrap();

        let stored = store.get_customization(product.id).await.unwrap().unwrap();
        assert_eq!(stored.font_size, "2rem");
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let store = InMemoryStore::new();
        let owner = UserId::new("a");
        for name in ["First", "Second", "Third"] {
            store.insert_product(new_product("a", name)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = store.list_products(&owner, Some(2)).await.unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second"]);
    }

    #[tokio::test]
    async fn test_country_upserts() {
        let store = InMemoryStore::new();
        let rows = store
            .upsert_country_groups(vec![NewCountryGroup {
                name: "Group 1".into(),
                recommended_discount_percentage: Some(0.2),
            }])
            .await
            .unwrap();
        assert_eq!(rows, 1);
        store
            .upsert_country_groups(vec![NewCountryGroup {
                name: "Group 1".into(),
                recommended_discount_percentage: Some(0.3),
            }])
            .await
            .unwrap();

        let groups = store.list_country_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group.recommended_discount_percentage, Some(0.3));

        let group_id = groups[0].group.id;
        for name in ["India", "Republic of India"] {
            store
                .upsert_countries(vec![NewCountry {
                    name: name.into(),
                    code: "IN".into(),
                    country_group_id: group_id,
                }])
                .await
                .unwrap();
        }
        let india = store.find_country_by_code("in").await.unwrap().unwrap();
        assert_eq!(india.name, "Republic of India");
        assert_eq!(store.list_country_groups().await.unwrap()[0].countries.len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_insert_if_absent() {
        let store = InMemoryStore::new();
        let owner = UserId::new("a");

        let first = store.insert_subscription_if_absent(&owner, TierName::Free).await;
        assert!(first.unwrap().is_some());
        let second = store.insert_subscription_if_absent(&owner, TierName::Premium).await;
        assert!(second.unwrap().is_none());
        assert_eq!(store.find_subscription(&owner).await.unwrap().unwrap().tier, TierName::Free);
    }

    #[tokio::test]
    async fn test_update_subscription_by_customer() {
        let store = InMemoryStore::new();
        let owner = UserId::new("a");
        store.insert_subscription_if_absent(&owner, TierName::Free).await.unwrap();
        store
            .update_subscription(
                &SubscriptionFilter::Owner(owner.clone()),
                SubscriptionPatch {
                    billing_customer_id: Some(Some("cus_1".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_subscription(
                &SubscriptionFilter::BillingCustomer("cus_1".into()),
                SubscriptionPatch {
                    tier: Some(TierName::Standard),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.tier, TierName::Standard);

        let missing = store
            .update_subscription(
                &SubscriptionFilter::BillingCustomer("cus_404".into()),
                SubscriptionPatch::default(),
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_user_data() {
        let store = InMemoryStore::new();
        let owner = UserId::new("a");
        store.insert_subscription_if_absent(&owner, TierName::Free).await.unwrap();
        store.insert_product(new_product("a", "One..")).await.unwrap();
        store.insert_product(new_product("b", "Other")).await.unwrap();

        let deleted = store.delete_user_data(&owner).await.unwrap();
        assert_eq!(deleted.subscriptions.len(), 1);
        assert_eq!(deleted.products.len(), 1);
        assert_eq!(store.product_total(), 1);
    }
}
