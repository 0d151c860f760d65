//! Banner serving pipeline
//!
//! ```text
//! referer + country ──► product by (id, url) ──► quota check ──► record view
//!                                                                   │
//!                                  script ◄── render ◄── discount ◄─┘
//! ```
//!
//! A view is recorded for every resolved product, including requests that are
//! then refused for being over the monthly quota.

use crate::cache::{CacheKind, CacheTag, TagCache};
use crate::discount::{resolve_discount, ResolvedDiscount};
use crate::error::{ParityError, ParityResult};
use crate::model::{Country, Product, ProductCustomization, ProductId};
use crate::permissions::PermissionEvaluator;
use crate::store::Store;
use crate::validation::remove_trailing_slash;
use chrono::Utc;
use std::sync::Arc;

/// Everything needed to decide and render a banner
#[derive(Debug, Clone, PartialEq)]
pub struct BannerProduct {
    pub product: Product,
    pub customization: ProductCustomization,
    pub country: Option<Country>,
    pub discount: Option<ResolvedDiscount>,
}

/// Incoming banner request
#[derive(Debug, Clone, Default)]
pub struct BannerRequest {
    pub product_id: ProductId,
    /// Page the script was loaded from (referer or origin)
    pub referer: Option<String>,
    pub country_code: Option<String>,
}

/// Why no banner was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    MissingReferer,
    MissingCountry,
    UnknownProduct,
    OverQuota,
    NoDiscount,
    /// Owner has no subscription row
    NoSubscription,
}

impl NotFoundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingReferer => "missing_referer",
            Self::MissingCountry => "missing_country",
            Self::UnknownProduct => "unknown_product",
            Self::OverQuota => "over_quota",
            Self::NoDiscount => "no_discount",
            Self::NoSubscription => "no_subscription",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BannerResponse {
    /// JavaScript body
    Script(String),
    NotFound(NotFoundReason),
}

pub struct BannerService {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
    permissions: Arc<PermissionEvaluator>,
    brand_url: String,
}

impl BannerService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<TagCache>,
        permissions: Arc<PermissionEvaluator>,
        brand_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            permissions,
            brand_url: brand_url.into(),
        }
    }

    /// Product registered at `url`, with its customization and the discount for `country_code`
    pub async fn get_product_for_banner(
        &self,
        id: ProductId,
        country_code: &str,
        url: &str,
    ) -> ParityResult<Option<BannerProduct>> {
        let url = remove_trailing_slash(url);
        let code = country_code.to_ascii_uppercase();
        let tags = [
            CacheTag::id(id, CacheKind::Products),
            CacheTag::global(CacheKind::Countries),
            CacheTag::global(CacheKind::CountryGroups),
        ];

        self.cache
            .cached(format!("banner:{id}:{code}:{url}"), &tags, || async {
                let Some(product) = self.store.find_product_by_url(id, url).await? else {
                    return Ok(None);
                };
                let Some(customization) = self.store.get_customization(id).await? else {
                    return Ok(None);
                };

                let country = self.store.find_country_by_code(&code).await?;
                let groups = self.store.list_country_groups().await?;
                let overrides = self.store.discounts_for_product(id).await?;
                let discount = resolve_discount(&code, &groups, &overrides);

                Ok::<_, ParityError>(Some(BannerProduct {
                    product,
                    customization,
                    country,
                    discount,
                }))
            })
            .await
    }

    pub async fn serve_banner(&self, request: BannerRequest) -> ParityResult<BannerResponse> {
        let Some(referer) = request.referer.filter(|r| !r.is_empty()) else {
            return Ok(BannerResponse::NotFound(NotFoundReason::MissingReferer));
        };
        let Some(code) = request.country_code.filter(|c| !c.is_empty()) else {
            return Ok(BannerResponse::NotFound(NotFoundReason::MissingCountry));
        };

        let Some(banner) = self
            .get_product_for_banner(request.product_id, &code, &referer)
            .await?
        else {
            tracing::debug!(
                product_id = %request.product_id,
                referer = %referer,
                "no product for banner"
            );
            return Ok(BannerResponse::NotFound(NotFoundReason::UnknownProduct));
        };

        let owner = &banner.product.owner_id;
        let can_show = match self.permissions.can_show_discount_banner(Some(owner)).await {
            Ok(can_show) => can_show,
            Err(ParityError::NoSubscription(_)) => {
                tracing::warn!(
                    product_id = %banner.product.id,
                    owner = %owner,
                    "banner owner has no subscription"
                );
                return Ok(BannerResponse::NotFound(NotFoundReason::NoSubscription));
            }
            Err(e) => return Err(e),
        };

        self.store
            .record_view(
                banner.product.id,
                banner.country.as_ref().map(|c| c.id),
                Utc::now(),
            )
            .await?;
        self.cache.revalidate(CacheKind::ProductViews, Some(owner), None);

        if !can_show {
            tracing::info!(
                product_id = %banner.product.id,
                owner = %owner,
                "monthly view limit reached"
            );
            return Ok(BannerResponse::NotFound(NotFoundReason::OverQuota));
        }

        let Some(discount) = banner.discount.as_ref().filter(|d| d.is_redeemable()) else {
            return Ok(BannerResponse::NotFound(NotFoundReason::NoDiscount));
        };

        let show_branding = !self.permissions.can_remove_branding(Some(owner)).await?;
        let brand_url = show_branding.then_some(self.brand_url.as_str());
        let html = banner_html(discount, &banner.customization, brand_url);
        Ok(BannerResponse::Script(banner_script(
            &html,
            &banner.customization.banner_container,
        )))
    }
}

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Substitute `{country}`, `{coupon}` and `{discount}` with escaped values
pub fn render_message(template: &str, discount: &ResolvedDiscount) -> String {
    let coupon = discount.coupon.as_deref().unwrap_or_default();
    template
        .replace("{country}", &escape_html(&discount.country.name))
        .replace("{coupon}", &escape_html(coupon))
        .replace("{discount}", &escape_html(&discount.percent_display()))
}

/// Banner markup; `brand_url` adds the branding link
pub fn banner_html(
    discount: &ResolvedDiscount,
    customization: &ProductCustomization,
    brand_url: Option<&str>,
) -> String {
    let prefix = escape_html(customization.class_prefix.as_deref().unwrap_or_default());
    let sticky = if customization.is_sticky {
        "position: sticky;"
    } else {
        ""
    };
    let branding = brand_url
        .map(|url| {
            format!(
                "<a class=\"{prefix}easy-ppp-branding\" href=\"{}\">Powered by Easy PPP</a>",
                escape_html(url)
            )
        })
        .unwrap_or_default();

    format!(
        "<style>\
.{prefix}easy-ppp-container {{ all: revert; display: flex; flex-direction: column; gap: .5em; \
background-color: {bg}; color: {fg}; font-size: {size}; font-family: inherit; padding: 1rem; \
{sticky} left: 0; right: 0; top: 0; text-wrap: balance; text-align: center; }}\
.{prefix}easy-ppp-branding {{ color: inherit; font-size: inherit; display: inline-block; text-decoration: underline; }}\
</style>\
<div class=\"{prefix}easy-ppp-container {prefix}easy-ppp-override\">\
<span class=\"{prefix}easy-ppp-message\">{message}</span>{branding}</div>",
        bg = escape_html(&customization.background_color),
        fg = escape_html(&customization.text_color),
        size = escape_html(&customization.font_size),
        message = render_message(&customization.location_message, discount),
    )
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Script that prepends `html` to the container element
pub fn banner_script(html: &str, container: &str) -> String {
    format!(
        "(function () {{\n  const banner = document.createElement(\"div\");\n  banner.innerHTML = {};\n  const target = document.querySelector({});\n  if (target) target.prepend(...banner.children);\n}})();\n",
        js_string(html),
        js_string(container),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountSource;
    use crate::memory::InMemoryStore;
    use crate::model::{CountryGroupDiscount, NewProduct, UserId};
    use crate::store::{
        CountryRepository, NewCountry, NewCountryGroup, ProductRepository, SubscriptionRepository,
        ViewRepository,
    };
    use crate::subscriptions::SubscriptionService;
    use crate::tiers::TierName;
    use chrono::Utc;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemoryStore>,
        banner: BannerService,
        product: Product,
        owner: UserId,
    }

    async fn fixture(tier: TierName, coupon: Option<&str>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(TagCache::default());
        let dyn_store: Arc<dyn Store> = store.clone();
        let subscriptions = Arc::new(SubscriptionService::new(dyn_store.clone(), cache.clone()));
        let permissions = Arc::new(PermissionEvaluator::new(
            dyn_store.clone(),
            cache.clone(),
            subscriptions,
        ));

        let owner = UserId::new("owner");
        store.insert_subscription_if_absent(&owner, tier).await.unwrap();
        let product = store
            .insert_product(NewProduct {
                owner_id: owner.clone(),
                name: "My Course".into(),
                url: "https://course.dev".into(),
                description: None,
            })
            .await
            .unwrap();
        store
            .insert_customization_if_absent(ProductCustomization::default_for(product.id))
            .await
            .unwrap();

        store
            .upsert_country_groups(vec![NewCountryGroup {
                name: "Group 4".into(),
                recommended_discount_percentage: Some(0.4),
            }])
            .await
            .unwrap();
        let group_id = store.list_country_groups().await.unwrap()[0].group.id;
        store
            .upsert_countries(vec![NewCountry {
                name: "India".into(),
                code: "IN".into(),
                country_group_id: group_id,
            }])
            .await
            .unwrap();
        if let Some(coupon) = coupon {
            store
                .apply_discount_changes(
                    product.id,
                    &[],
                    vec![CountryGroupDiscount {
                        product_id: product.id,
                        country_group_id: group_id,
                        coupon: coupon.into(),
                        discount_percentage: 0.5,
                    }],
                )
                .await
                .unwrap();
        }

        Fixture {
            banner: BannerService::new(dyn_store, cache, permissions, "https://easyppp.dev"),
            store,
            product,
            owner,
        }
    }

    fn request(f: &Fixture, referer: Option<&str>, country: Option<&str>) -> BannerRequest {
        BannerRequest {
            product_id: f.product.id,
            referer: referer.map(String::from),
            country_code: country.map(String::from),
        }
    }

    async fn views(f: &Fixture) -> u64 {
        f.store
            .count_views_since(&f.owner, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_serves_script_with_coupon() {
        let f = fixture(TierName::Free, Some("PPP50")).await;

        let response = f
            .banner
            .serve_banner(request(&f, Some("https://course.dev/"), Some("in")))
            .await
            .unwrap();
        let BannerResponse::Script(js) = response else {
            panic!("expected script, got {response:?}");
        };
        assert!(js.contains("PPP50"));
        assert!(js.contains("50%"));
        assert!(js.contains("India"));
        assert!(js.contains("Powered by Easy PPP"));
        assert!(js.contains("document.querySelector(\"body\")"));
        assert_eq!(views(&f).await, 1);
    }

    #[tokio::test]
    async fn test_paid_tier_removes_branding() {
        let f = fixture(TierName::Premium, Some("PPP50")).await;
        let response = f
            .banner
            .serve_banner(request(&f, Some("https://course.dev"), Some("IN")))
            .await
            .unwrap();
        let BannerResponse::Script(js) = response else {
            panic!("expected script");
        };
        assert!(!js.contains("Powered by"));
    }

    #[tokio::test]
    async fn test_missing_inputs() {
        let f = fixture(TierName::Free, Some("PPP50")).await;
        assert_eq!(
            f.banner.serve_banner(request(&f, None, Some("IN"))).await.unwrap(),
            BannerResponse::NotFound(NotFoundReason::MissingReferer)
        );
        assert_eq!(
            f.banner
                .serve_banner(request(&f, Some("https://course.dev"), None))
                .await
                .unwrap(),
            BannerResponse::NotFound(NotFoundReason::MissingCountry)
        );
        assert_eq!(views(&f).await, 0);
    }

    #[tokio::test]
    async fn test_url_must_match_product() {
        let f = fixture(TierName::Free, Some("PPP50")).await;
        let response = f
            .banner
            .serve_banner(request(&f, Some("https://elsewhere.dev"), Some("IN")))
            .await
            .unwrap();
        assert_eq!(response, BannerResponse::NotFound(NotFoundReason::UnknownProduct));
        assert_eq!(views(&f).await, 0);
    }

    #[tokio::test]
    async fn test_recommendation_only_is_not_shown_but_counted() {
        let f = fixture(TierName::Free, None).await;

        let banner = f
            .banner
            .get_product_for_banner(f.product.id, "IN", "https://course.dev")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(banner.discount.as_ref().map(|d| d.source), Some(DiscountSource::Recommended));

        let response = f
            .banner
            .serve_banner(request(&f, Some("https://course.dev"), Some("IN")))
            .await
            .unwrap();
        assert_eq!(response, BannerResponse::NotFound(NotFoundReason::NoDiscount));
        assert_eq!(views(&f).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_country_still_counted() {
        let f = fixture(TierName::Free, Some("PPP50")).await;
        let response = f
            .banner
            .serve_banner(request(&f, Some("https://course.dev"), Some("ZZ")))
            .await
            .unwrap();
        assert_eq!(response, BannerResponse::NotFound(NotFoundReason::NoDiscount));

        let recorded = f
            .store
            .views_since(&f.owner, Utc::now() - chrono::Duration::hours(1), None)
            .await
            .unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].country_id.is_none());
    }

    #[tokio::test]
    async fn test_over_quota_refused_after_recording() {
        let f = fixture(TierName::Free, Some("PPP50")).await;
        let limit = TierName::Free.tier().max_number_of_visits;
        for _ in 0..limit {
            f.store.record_view(f.product.id, None, Utc::now()).await.unwrap();
        }

        let response = f
            .banner
            .serve_banner(request(&f, Some("https://course.dev"), Some("IN")))
            .await
            .unwrap();
        assert_eq!(response, BannerResponse::NotFound(NotFoundReason::OverQuota));
        assert_eq!(views(&f).await, limit + 1);
    }

    #[tokio::test]
    async fn test_owner_without_subscription_gets_not_found() {
        let f = fixture(TierName::Free, Some("PPP50")).await;
        let orphan = f
            .store
            .insert_product(NewProduct {
                owner_id: UserId::new("orphan"),
                name: "Orphaned".into(),
                url: "https://orphan.dev".into(),
                description: None,
            })
            .await
            .unwrap();
        f.store
            .insert_customization_if_absent(ProductCustomization::default_for(orphan.id))
            .await
            .unwrap();

        let response = f
            .banner
            .serve_banner(BannerRequest {
                product_id: orphan.id,
                referer: Some("https://orphan.dev".into()),
                country_code: Some("IN".into()),
            })
            .await
            .unwrap();
        assert_eq!(response, BannerResponse::NotFound(NotFoundReason::NoSubscription));
    }

    #[test]
    fn test_message_is_escaped() {
        let discount = ResolvedDiscount {
            country: Country {
                id: Uuid::new_v4(),
                name: "<Côte d'Ivoire>".into(),
                code: "CI".into(),
                country_group_id: Uuid::new_v4(),
            },
            group_id: Uuid::new_v4(),
            percentage: 0.3,
            coupon: Some("A&B".into()),
            source: DiscountSource::Override,
        };
        let msg = render_message("{country} {coupon} {discount}%", &discount);
        assert_eq!(msg, "&lt;Côte d&#39;Ivoire&gt; A&amp;B 30%");
    }

    #[test]
    fn test_class_prefix_and_sticky() {
        let mut customization = ProductCustomization::default_for(Uuid::new_v4());
        customization.class_prefix = Some("acme-".into());
        customization.is_sticky = false;
        let discount = ResolvedDiscount {
            country: Country {
                id: Uuid::new_v4(),
                name: "India".into(),
                code: "IN".into(),
                country_group_id: Uuid::new_v4(),
            },
            group_id: Uuid::new_v4(),
            percentage: 0.5,
            coupon: Some("PPP".into()),
            source: DiscountSource::Override,
        };

        let html = banner_html(&discount, &customization, None);
        assert!(html.contains("acme-easy-ppp-container"));
        assert!(!html.contains("position: sticky"));
        assert!(!html.contains("Powered by"));
    }

    #[test]
    fn test_script_quotes_selector() {
        let js = banner_script("<b>\"hi\"</b>", "#main .banner");
        assert!(js.contains(r#"banner.innerHTML = "<b>\"hi\"</b>";"#));
        assert!(js.contains(r##"document.querySelector("#main .banner")"##));
    }
}
