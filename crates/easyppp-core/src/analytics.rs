//! Banner view analytics

use crate::cache::{CacheKind, CacheTag, TagCache};
use crate::error::{ParityError, ParityResult};
use crate::model::{CountryId, ProductId, UserId};
use crate::permissions::PermissionEvaluator;
use crate::store::Store;
use crate::validation::ValidationErrors;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

/// Reporting window ending today (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewInterval {
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_365_days")]
    Last365Days,
}

impl ViewInterval {
    pub fn days(&self) -> i64 {
        match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
            Self::Last365Days => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last7Days => "last_7_days",
            Self::Last30Days => "last_30_days",
            Self::Last365Days => "last_365_days",
        }
    }

    /// First day of the window
    pub fn first_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.date_naive() - Duration::days(self.days() - 1)
    }
}

impl Default for ViewInterval {
    fn default() -> Self {
        Self::Last7Days
    }
}

impl FromStr for ViewInterval {
    type Err = ParityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_7_days" | "7d" => Ok(Self::Last7Days),
            "last_30_days" | "30d" => Ok(Self::Last30Days),
            "last_365_days" | "365d" => Ok(Self::Last365Days),
            other => {
                let mut errors = ValidationErrors::new();
                errors.push("interval", format!("Unknown interval {other}"));
                Err(errors.into())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryViews {
    pub country_code: Option<String>,
    pub country_name: String,
    pub views: u64,
}

/// Aggregated report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewStats {
    pub interval: ViewInterval,
    pub total: u64,
    /// One entry per day of the window, oldest first
    pub by_day: Vec<DailyViews>,
    /// Most viewed first
    pub by_country: Vec<CountryViews>,
}

const UNKNOWN_COUNTRY: &str = "Unknown";

pub struct AnalyticsService {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
    permissions: Arc<PermissionEvaluator>,
}

impl AnalyticsService {
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

    /// Views of the user's products, optionally narrowed to one product
    pub async fn view_stats(
        &self,
        user: &UserId,
        interval: ViewInterval,
        product: Option<ProductId>,
    ) -> ParityResult<ViewStats> {
        if !self.permissions.can_access_analytics(Some(user)).await? {
            return Err(ParityError::PermissionDenied("analytics not in tier"));
        }

        let now = Utc::now();
        let first_day = interval.first_day(now);
        let tags = [
            CacheTag::user(user, CacheKind::ProductViews),
            CacheTag::global(CacheKind::Countries),
        ];
        let key = format!(
            "analytics:{user}:{}:{}:{}",
            interval.as_str(),
            first_day,
            product.map(|p| p.to_string()).unwrap_or_default()
        );

        self.cache
            .cached(key, &tags, || async {
                let since = first_day.and_time(NaiveTime::MIN).and_utc();
                let views = self.store.views_since(user, since, product).await?;

                let countries: HashMap<CountryId, (String, String)> = self
                    .store
                    .list_country_groups()
                    .await?
                    .into_iter()
                    .flat_map(|g| g.countries)
                    .map(|c| (c.id, (c.code, c.name)))
                    .collect();

                let mut days: BTreeMap<NaiveDate, u64> = (0..interval.days())
                    .map(|offset| (first_day + Duration::days(offset), 0))
                    .collect();
                let mut per_country: HashMap<Option<CountryId>, u64> = HashMap::new();

                for view in &views {
                    if let Some(count) = days.get_mut(&view.visited_at.date_naive()) {
                        *count += 1;
                    }
                    *per_country.entry(view.country_id).or_default() += 1;
                }

                let mut by_country: Vec<CountryViews> = per_country
                    .into_iter()
                    .map(|(id, views)| match id.and_then(|id| countries.get(&id)) {
                        Some((code, name)) => CountryViews {
                            country_code: Some(code.clone()),
                            country_name: name.clone(),
                            views,
                        },
                        None => CountryViews {
                            country_code: None,
                            country_name: UNKNOWN_COUNTRY.to_string(),
                            views,
                        },
                    })
                    .collect();
                // several deleted countries collapse into the same "Unknown" bucket
                by_country = merge_unknown(by_country);
                by_country.sort_by(|a, b| {
                    b.views
                        .cmp(&a.views)
                        .then_with(|| a.country_name.cmp(&b.country_name))
                });

                Ok::<_, ParityError>(ViewStats {
                    interval,
                    total: views.len() as u64,
                    by_day: days
                        .into_iter()
                        .map(|(date, views)| DailyViews { date, views })
                        .collect(),
                    by_country,
                })
            })
            .await
    }
}

fn merge_unknown(rows: Vec<CountryViews>) -> Vec<CountryViews> {
    let mut unknown = 0;
    let mut out: Vec<CountryViews> = rows
        .into_iter()
        .filter_map(|row| {
            if row.country_code.is_none() {
                unknown += row.views;
                None
            } else {
                Some(row)
            }
        })
        .collect();
    if unknown > 0 {
        out.push(CountryViews {
            country_code: None,
            country_name: UNKNOWN_COUNTRY.to_string(),
            views: unknown,
        });
    }
    out
}
