//! Country discount resolution
//!
//! A product-level override for the visitor's country group beats the group's
//! recommended percentage. An override is only usable when it carries both a
//! non-empty coupon and a positive percentage.

use crate::model::{Country, CountryGroupDiscount, CountryGroupId, CountryGroupWithCountries};
use serde::{Deserialize, Serialize};

/// Where a resolved discount came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountSource {
    Override,
    Recommended,
}

/// Discount applicable to one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDiscount {
    pub country: Country,
    pub group_id: CountryGroupId,
    /// Fraction, `0.4` = 40%
    pub percentage: f64,
    pub coupon: Option<String>,
    pub source: DiscountSource,
}

impl ResolvedDiscount {
    /// Whole-number percent for display
    pub fn percent_display(&self) -> String {
        to_percent(self.percentage)
    }

    /// Only coupon-carrying discounts can be shown in a banner
    pub fn is_redeemable(&self) -> bool {
        self.coupon.is_some()
    }
}

/// Fraction to whole display percent (`0.25` -> `"25"`, `0.125` -> `"13"`)
pub fn to_percent(fraction: f64) -> String {
    format!("{}", (fraction * 100.0).round() as i64)
}

/// Usable override, if the row is complete
pub fn usable_override(discount: &CountryGroupDiscount) -> Option<(f64, &str)> {
    let coupon = discount.coupon.trim();
    if coupon.is_empty() || !(discount.discount_percentage > 0.0) {
        return None;
    }
    Some((discount.discount_percentage, coupon))
}

/// Resolve the discount for `country_code`
pub fn resolve_discount(
    country_code: &str,
    groups: &[CountryGroupWithCountries],
    overrides: &[CountryGroupDiscount],
) -> Option<ResolvedDiscount> {
    let (group, country) = groups.iter().find_map(|g| {
        g.countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(country_code))
            .map(|c| (g, c))
    })?;

    resolve_for_group(group, overrides).map(|(percentage, coupon, source)| ResolvedDiscount {
        country: country.clone(),
        group_id: group.group.id,
        percentage,
        coupon,
        source,
    })
}

/// Resolve a single group, without a country
pub fn resolve_for_group(
    group: &CountryGroupWithCountries,
    overrides: &[CountryGroupDiscount],
) -> Option<(f64, Option<String>, DiscountSource)> {
    let best = overrides
        .iter()
        .filter(|d| d.country_group_id == group.group.id)
        .find_map(usable_override);
    if let Some((percentage, coupon)) = best {
        return Some((percentage, Some(coupon.to_string()), DiscountSource::Override));
    }

    group
        .group
        .recommended_discount_percentage
        .filter(|p| *p > 0.0)
        .map(|p| (p, None, DiscountSource::Recommended))
}
