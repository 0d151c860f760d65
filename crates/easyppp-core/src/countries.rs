//! Country group dataset import

use crate::cache::{CacheKind, TagCache};
use crate::error::{DatasetError, ParityResult};
use crate::store::{NewCountry, NewCountryGroup, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bundled dataset
pub const DEFAULT_DATASET: &str = include_str!("../data/countries_by_discount.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetGroup {
    pub name: String,
    pub recommended_discount_percentage: Option<f64>,
    pub countries: Vec<DatasetCountry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCountry {
    #[serde(rename = "countryName")]
    pub country_name: String,
    /// ISO code
    pub country: String,
}

/// Rows written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub groups: u64,
    pub countries: u64,
}

pub fn parse_dataset(json: &str) -> Result<Vec<DatasetGroup>, DatasetError> {
    let groups: Vec<DatasetGroup> =
        serde_json::from_str(json).map_err(|e| DatasetError::Malformed(e.to_string()))?;

    for group in &groups {
        if let Some(pct) = group.recommended_discount_percentage {
            if !(0.0..=1.0).contains(&pct) {
                return Err(DatasetError::Malformed(format!(
                    "group {} has recommended discount {pct} outside 0..=1",
                    group.name
                )));
            }
        }
        if let Some(bad) = group.countries.iter().find(|c| c.country.len() != 2) {
            return Err(DatasetError::Malformed(format!("invalid country code {:?}", bad.country)));
        }
    }
    Ok(groups)
}

pub struct CountryImporter {
    store: Arc<dyn Store>,
    cache: Arc<TagCache>,
}

impl CountryImporter {
    pub fn new(store: Arc<dyn Store>, cache: Arc<TagCache>) -> Self {
        Self { store, cache }
    }

    /// Upsert groups then countries
    pub async fn import(&self, dataset: &[DatasetGroup]) -> ParityResult<ImportSummary> {
        let groups = self.update_country_groups(dataset).await?;
        let countries = self.update_countries(dataset).await?;

        tracing::info!(groups, countries, "country dataset imported");
        Ok(ImportSummary { groups, countries })
    }

    async fn update_country_groups(&self, dataset: &[DatasetGroup]) -> ParityResult<u64> {
        let rows = dataset
            .iter()
            .map(|g| NewCountryGroup {
                name: g.name.clone(),
                recommended_discount_percentage: g.recommended_discount_percentage,
            })
            .collect();
        let affected = self.store.upsert_country_groups(rows).await?;
        self.cache.revalidate(CacheKind::CountryGroups, None, None);
        Ok(affected)
    }

    async fn update_countries(&self, dataset: &[DatasetGroup]) -> ParityResult<u64> {
        let stored = self.store.list_country_groups().await?;

        let mut rows = Vec::new();
        for group in dataset {
            let id = stored
                .iter()
                .find(|g| g.group.name == group.name)
                .map(|g| g.group.id)
                .ok_or_else(|| DatasetError::GroupNotFound(group.name.clone()))?;
            rows.extend(group.countries.iter().map(|c| NewCountry {
                name: c.country_name.clone(),
                code: c.country.to_ascii_uppercase(),
                country_group_id: id,
            }));
        }

        let affected = self.store.upsert_countries(rows).await?;
        self.cache.revalidate(CacheKind::Countries, None, None);
        Ok(affected)
    }
}
