//! Tier catalog

use crate::models::ApiResponse;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use easyppp_core::tiers::all_tiers;
use easyppp_core::{SubscriptionTier, TierName};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct TierView {
    #[serde(flatten)]
    pub tier: SubscriptionTier,
    /// Billing price id, unset for Free
    pub price_id: Option<String>,
}

pub async fn list_tiers(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<TierView>>> {
    let tiers = all_tiers()
        .into_iter()
        .map(|tier| TierView {
            price_id: match tier.name {
                TierName::Free => None,
                name => state.prices.price_for_tier(name).map(String::from),
            },
            tier: tier.clone(),
        })
        .collect();
    Json(ApiResponse::success(tiers))
}
