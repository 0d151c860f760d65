//! View analytics endpoint

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{AnalyticsParams, ApiResponse};
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use easyppp_core::analytics::ViewStats;
use std::sync::Arc;

pub async fn view_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult<Json<ApiResponse<ViewStats>>> {
    let stats = state
        .platform
        .analytics
        .view_stats(&user, params.interval.unwrap_or_default(), params.product_id)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}
