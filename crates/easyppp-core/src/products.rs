//! Product CRUD, customization and country discounts

use crate::cache::{CacheKind, CacheTag, TagCache};
use crate::discount::resolve_for_group;
use crate::error::{ParityError, ParityResult};
use crate::model::*;
use crate::permissions::PermissionEvaluator;
use crate::store::Store;
use crate::validation::{CountryDiscountsInput, CustomizationInput, ProductDetailsInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// User-facing outcome messages
pub mod messages {
    pub const CREATE_FAILED: &str = "An error occured while creating your product";
    pub const UPDATE_FAILED: &str = "An error occured while updating your product";
    pub const UPDATED: &str = "Product updated successfully";
    pub const NOT_UPDATED: &str = "Error updating product";
    pub const DELETED: &str = "Product deleted successfully";
    pub const NOT_DELETED: &str = "Error deleting product";
    pub const DISCOUNTS_FAILED: &str = "An error occured while saving your country discounts";
    pub const DISCOUNTS_SAVED: &str = "Country discounts saved";
    pub const BANNER_FAILED: &str = "There was an error updating your banner";
    pub const BANNER_UPDATED: &str = "Banner updated";
}

/// Country reference inside a group listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRef {
    pub name: String,
    pub code: String,
}

/// The product's override for a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDiscountRef {
    pub coupon: String,
    pub discount_percentage: f64,
}

/// One row of the country discount form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCountryGroup {
    pub id: CountryGroupId,
    pub name: String,
    pub recommended_discount_percentage: Option<f64>,
    pub countries: Vec<CountryRef>,
    pub country_group_discount: Option<GroupDiscountRef>,
    /// Form default, 0..=100
    pub default_discount_percentage: Option<f64>,
    pub default_coupon: String,
}

/// Script tag merchants paste into their site
pub fn embed_code(public_url: &str, id: ProductId) -> String {
    format!(
        "<script src=\"{}/api/products/{}/banner\"></script>",
        public_url.trim_end_matches('/'),
        id
    )
}

/// Cached product count for `user`
pub(crate) async fn product_count(
    store: &Arc<dyn Store>,
    cache: &TagCache,
    user: &UserId,
) -> ParityResult<u64> {
    let tags = [CacheTag::user(user, CacheKind::Products)];
    cache
        .cached(format!("products:count:{user}"), &tags, || async {
            store.count_products(user).await.map_err(ParityError::from)
        })
        .await
}

pub struct ProductService {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
    permissions: Arc<PermissionEvaluator>,
}

impl ProductService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<TagCache>,
        permissions: Arc<PermissionEvaluator>,
    ) -> Self {
        Self {
            store,
            cache,
            permissions,
        }
    }

    fn revalidate(&self, user: &UserId, id: ProductId) {
        self.cache
            .revalidate(CacheKind::Products, Some(user), Some(&id.to_string()));
    }

    /// Create a product and its default customization
    pub async fn create_product(
        &self,
        user: Option<&UserId>,
        input: ProductDetailsInput,
    ) -> ParityResult<Product> {
        let details = input.validate()?;
        let user = user.ok_or(ParityError::Unauthenticated)?;
        if !self.permissions.can_create_product(Some(user)).await? {
            return Err(ParityError::PermissionDenied("product limit reached for tier"));
        }

        let product = self
            .store
            .insert_product(NewProduct {
                owner_id: user.clone(),
                name: details.name,
                url: details.url,
                description: details.description,
            })
            .await?;

        let customization = ProductCustomization::default_for(product.id);
        if let Err(err) = self.store.insert_customization_if_absent(customization).await {
            tracing::error!(
                product_id = %product.id,
                error = %err,
                "customization insert failed, rolling back product"
            );
            if let Err(rollback) = self.store.delete_product(user, product.id).await {
                tracing::error!(
                    product_id = %product.id,
                    error = %rollback,
                    "product rollback failed"
                );
            }
            self.revalidate(user, product.id);
            return Err(err.into());
        }

        self.revalidate(user, product.id);
        tracing::info!(user = %user, product_id = %product.id, "product created");
        Ok(product)
    }

    /// Returns whether the owner's product changed
    pub async fn update_product(
        &self,
        user: &UserId,
        id: ProductId,
        input: ProductDetailsInput,
    ) -> ParityResult<bool> {
        let details = input.validate()?;
        let updated = self.store.update_product(user, id, details).await?;
        if updated {
            self.revalidate(user, id);
        }
        Ok(updated)
    }

    /// Returns whether the owner's product was deleted
    pub async fn delete_product(&self, user: &UserId, id: ProductId) -> ParityResult<bool> {
        let deleted = self.store.delete_product(user, id).await?;
        if deleted {
            self.revalidate(user, id);
            // views cascade with the product
            self.cache.revalidate(CacheKind::ProductViews, Some(user), None);
            self.cache.retire(CacheKind::Products, &id.to_string());
            tracing::info!(user = %user, product_id = %id, "product deleted");
        }
        Ok(deleted)
    }

    /// Newest first
    pub async fn get_products(
        &self,
        user: &UserId,
        limit: Option<usize>,
    ) -> ParityResult<Vec<Product>> {
        let tags = [CacheTag::user(user, CacheKind::Products)];
        let key = format!("products:list:{user}:{limit:?}");
        self.cache
            .cached(key, &tags, || async {
                self.store
                    .list_products(user, limit)
                    .await
                    .map_err(ParityError::from)
            })
            .await
    }

    pub async fn get_product(&self, user: &UserId, id: ProductId) -> ParityResult<Option<Product>> {
        let tags = [
            CacheTag::id(id, CacheKind::Products),
            CacheTag::global(CacheKind::Countries),
            CacheTag::global(CacheKind::CountryGroups),
        ];
        self.cache
            .cached(format!("products:one:{user}:{id}"), &tags, || async {
                self.store.find_product(user, id).await.map_err(ParityError::from)
            })
            .await
    }

    pub async fn get_product_count(&self, user: &UserId) -> ParityResult<u64> {
        product_count(&self.store, &self.cache, user).await
    }

    /// `None` unless `user` owns the product
    pub async fn get_product_customization(
        &self,
        user: &UserId,
        id: ProductId,
    ) -> ParityResult<Option<ProductCustomization>> {
        let tags = [CacheTag::id(id, CacheKind::Products)];
        self.cache
            .cached(format!("products:customization:{user}:{id}"), &tags, || async {
                if self.get_product(user, id).await?.is_none() {
                    return Ok(None);
                }
                self.store.get_customization(id).await.map_err(ParityError::from)
            })
            .await
    }

    /// Requires banner customization on the user's tier
    pub async fn update_product_customization(
        &self,
        user: Option<&UserId>,
        id: ProductId,
        input: CustomizationInput,
    ) -> ParityResult<bool> {
        let update = input.validate()?;
        let user = user.ok_or(ParityError::Unauthenticated)?;
        if !self.permissions.can_customize_banner(Some(user)).await? {
            return Err(ParityError::PermissionDenied("banner customization not in tier"));
        }
        if self.get_product(user, id).await?.is_none() {
            return Ok(false);
        }

        let updated = self.store.update_customization(id, update).await?;
        self.revalidate(user, id);
        Ok(updated)
    }

    /// Every country group with this product's override and form default
    pub async fn get_product_country_groups(
        &self,
        user: &UserId,
        id: ProductId,
    ) -> ParityResult<Vec<ProductCountryGroup>> {
        let tags = [
            CacheTag::id(id, CacheKind::Products),
            CacheTag::global(CacheKind::Countries),
            CacheTag::global(CacheKind::CountryGroups),
        ];
        self.cache
            .cached(format!("products:country-groups:{user}:{id}"), &tags, || async {
                if self.get_product(user, id).await?.is_none() {
                    return Ok(Vec::new());
                }
                let groups = self.store.list_country_groups().await?;
                let overrides = self.store.discounts_for_product(id).await?;

                Ok(groups
                    .iter()
                    .map(|g| {
                        let discount = overrides
                            .iter()
                            .find(|d| d.country_group_id == g.group.id)
                            .map(|d| GroupDiscountRef {
                                coupon: d.coupon.clone(),
                                discount_percentage: d.discount_percentage,
                            });
                        let default_discount_percentage = discount
                            .as_ref()
                            .map(|d| d.discount_percentage)
                            .or_else(|| resolve_for_group(g, &overrides).map(|(p, _, _)| p))
                            .map(|p| p * 100.0);

                        ProductCountryGroup {
                            id: g.group.id,
                            name: g.group.name.clone(),
                            recommended_discount_percentage: g
                                .group
                                .recommended_discount_percentage,
                            countries: g
                                .countries
                                .iter()
                                .map(|c| CountryRef {
                                    name: c.name.clone(),
                                    code: c.code.clone(),
                                })
                                .collect(),
                            default_coupon: discount
                                .as_ref()
                                .map(|d| d.coupon.clone())
                                .unwrap_or_default(),
                            country_group_discount: discount,
                            default_discount_percentage,
                        }
                    })
                    .collect())
            })
            .await
    }

    /// Split the form into upserts and deletes and apply as one batch
    ///
    /// Returns false when the product is not owned by `user`.
    pub async fn update_country_discounts(
        &self,
        user: &UserId,
        id: ProductId,
        input: CountryDiscountsInput,
    ) -> ParityResult<bool> {
        let groups = input.validate()?;
        if self.get_product(user, id).await?.is_none() {
            return Ok(false);
        }

        let mut upserts = Vec::new();
        let mut deletes = Vec::new();
        for group in groups {
            match (group.coupon, group.discount_percentage) {
                (Some(coupon), Some(percentage)) if percentage > 0.0 => {
                    upserts.push(CountryGroupDiscount {
                        product_id: id,
                        country_group_id: group.country_group_id,
                        coupon,
                        discount_percentage: percentage / 100.0,
                    })
                }
                _ => deletes.push(group.country_group_id),
            }
        }

        tracing::debug!(
            product_id = %id,
            upserts = upserts.len(),
            deletes = deletes.len(),
            "saving country discounts"
        );
        self.store.apply_discount_changes(id, &deletes, upserts).await?;
        self.revalidate(user, id);
        Ok(true)
    }
}
