//! Caller's tier flags and usage

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::ApiResponse;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use easyppp_core::PermissionSet;
use std::sync::Arc;

pub async fn get_permissions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<ApiResponse<PermissionSet>>> {
    let set = state.platform.permissions.permission_set(&user).await?;
    Ok(Json(ApiResponse::success(set)))
}
