//! Repositories - persistence abstraction
//!
//! Product queries are owner-scoped except the banner lookup. Multi-row
//! writes (`apply_discount_changes`, `delete_user_data`) are single batches.

use crate::error::ParityError;
use crate::model::*;
use crate::tiers::TierName;
use crate::validation::{CustomizationUpdate, ProductDetails};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Repository errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ParityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ParityError::NotFound(what),
            other => ParityError::Storage(other.to_string()),
        }
    }
}

/// Country group upsert row
#[derive(Debug, Clone, PartialEq)]
pub struct NewCountryGroup {
    pub name: String,
    pub recommended_discount_percentage: Option<f64>,
}

/// Country upsert row
#[derive(Debug, Clone, PartialEq)]
pub struct NewCountry {
    pub name: String,
    pub code: String,
    pub country_group_id: CountryGroupId,
}

/// Ids removed by `delete_user_data`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletedUserData {
    pub subscriptions: Vec<SubscriptionId>,
    pub products: Vec<ProductId>,
}

/// Product and customization rows
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;

    /// No-op if the product already has a customization
    async fn insert_customization_if_absent(
        &self,
        customization: ProductCustomization,
    ) -> StoreResult<()>;

    async fn find_product(&self, owner: &UserId, id: ProductId) -> StoreResult<Option<Product>>;

    /// Unscoped lookup by id and exact stored url
    async fn find_product_by_url(&self, id: ProductId, url: &str) -> StoreResult<Option<Product>>;

    /// Newest first
    async fn list_products(
        &self,
        owner: &UserId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Product>>;

    async fn count_products(&self, owner: &UserId) -> StoreResult<u64>;

    /// Returns whether a row changed
    async fn update_product(
        &self,
        owner: &UserId,
        id: ProductId,
        details: ProductDetails,
    ) -> StoreResult<bool>;

    /// Cascades to customization, discounts and views
    async fn delete_product(&self, owner: &UserId, id: ProductId) -> StoreResult<bool>;

    async fn get_customization(
        &self,
        product_id: ProductId,
    ) -> StoreResult<Option<ProductCustomization>>;

    async fn update_customization(
        &self,
        product_id: ProductId,
        update: CustomizationUpdate,
    ) -> StoreResult<bool>;
}

/// Country, group and discount rows
#[async_trait]
pub trait CountryRepository: Send + Sync {
    async fn list_country_groups(&self) -> StoreResult<Vec<CountryGroupWithCountries>>;

    async fn find_country_by_code(&self, code: &str) -> StoreResult<Option<Country>>;

    async fn discounts_for_product(
        &self,
        product_id: ProductId,
    ) -> StoreResult<Vec<CountryGroupDiscount>>;

    /// Delete `deletes`, then upsert `upserts` on (product, group), atomically
    async fn apply_discount_changes(
        &self,
        product_id: ProductId,
        deletes: &[CountryGroupId],
        upserts: Vec<CountryGroupDiscount>,
    ) -> StoreResult<()>;

    /// Upsert on name; returns affected rows
    async fn upsert_country_groups(&self, groups: Vec<NewCountryGroup>) -> StoreResult<u64>;

    /// Upsert on code; returns affected rows
    async fn upsert_countries(&self, countries: Vec<NewCountry>) -> StoreResult<u64>;
}

/// Subscription rows
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// `None` if the user already has one
    async fn insert_subscription_if_absent(
        &self,
        owner: &UserId,
        tier: TierName,
    ) -> StoreResult<Option<UserSubscription>>;

    async fn find_subscription(&self, owner: &UserId) -> StoreResult<Option<UserSubscription>>;

    async fn update_subscription(
        &self,
        filter: &SubscriptionFilter,
        patch: SubscriptionPatch,
    ) -> StoreResult<Option<UserSubscription>>;

    /// Drop subscriptions and products of `owner` in one batch
    async fn delete_user_data(&self, owner: &UserId) -> StoreResult<DeletedUserData>;
}

/// Banner impressions
#[async_trait]
pub trait ViewRepository: Send + Sync {
    async fn record_view(
        &self,
        product_id: ProductId,
        country_id: Option<CountryId>,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Views of any product owned by `owner` at or after `since`
    async fn count_views_since(&self, owner: &UserId, since: DateTime<Utc>) -> StoreResult<u64>;

    async fn views_since(
        &self,
        owner: &UserId,
        since: DateTime<Utc>,
        product: Option<ProductId>,
    ) -> StoreResult<Vec<ProductView>>;
}

/// Everything the services need
pub trait Store: ProductRepository + CountryRepository + SubscriptionRepository + ViewRepository {}

impl<T> Store for T where
    T: ProductRepository + CountryRepository + SubscriptionRepository + ViewRepository
{
}
