//! Product management endpoints

use crate::auth::{AuthUser, MaybeUser};
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use easyppp_core::model::{Product, ProductId};
use easyppp_core::products::{embed_code as render_embed_code, messages, ProductCountryGroup};
use easyppp_core::validation::{CountryDiscountsInput, CustomizationInput, ProductDetailsInput};
use std::sync::Arc;

const PRODUCT_NOT_FOUND: &str = "Product not found";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/customization", get(get_customization).put(update_customization))
        .route(
            "/:id/country-discounts",
            get(get_country_discounts).put(update_country_discounts),
        )
        .route("/:id/embed-code", get(embed_code))
        .route("/:id/banner", get(super::banner::serve_banner))
}

async fn owned_product(state: &AppState, user: &AuthUser, id: ProductId) -> ApiResult<Product> {
    state
        .platform
        .products
        .get_product(&user.0, id)
        .await?
        .ok_or(ApiError::NotFound(PRODUCT_NOT_FOUND))
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListProductsParams>,
) -> ApiResult<Json<ApiResponse<Vec<Product>>>> {
    let products = state.platform.products.get_products(&user, params.limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    user: MaybeUser,
    Json(input): Json<ProductDetailsInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let product = state
        .platform
        .products
        .create_product(user.user(), input)
        .await
        .map_err(ApiError::action(messages::CREATE_FAILED))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    let product = owned_product(&state, &user, id).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductDetailsInput>,
) -> ApiResult<Json<ApiResponse<ActionMessage>>> {
    let updated = state
        .platform
        .products
        .update_product(&user, id, input)
        .await
        .map_err(ApiError::action(messages::UPDATE_FAILED))?;
    if !updated {
        return Err(ApiError::NotFound(messages::NOT_UPDATED));
    }
    Ok(Json(ApiResponse::success(messages::UPDATED.into())))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<ApiResponse<ActionMessage>>> {
    let deleted = state
        .platform
        .products
        .delete_product(&user, id)
        .await
        .map_err(ApiError::action(messages::NOT_DELETED))?;
    if !deleted {
        return Err(ApiError::NotFound(messages::NOT_DELETED));
    }
    Ok(Json(ApiResponse::success(messages::DELETED.into())))
}

pub async fn get_customization(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<ApiResponse<CustomizationView>>> {
    let customization = state
        .platform
        .products
        .get_product_customization(&user, id)
        .await?
        .ok_or(ApiError::NotFound(PRODUCT_NOT_FOUND))?;
    let permissions = &state.platform.permissions;

    Ok(Json(ApiResponse::success(CustomizationView {
        customization,
        can_customize_banner: permissions.can_customize_banner(Some(&user)).await?,
        can_remove_branding: permissions.can_remove_branding(Some(&user)).await?,
    })))
}

pub async fn update_customization(
    State(state): State<Arc<AppState>>,
    user: MaybeUser,
    Path(id): Path<ProductId>,
    Json(input): Json<CustomizationInput>,
) -> ApiResult<Json<ApiResponse<ActionMessage>>> {
    let updated = state
        .platform
        .products
        .update_product_customization(user.user(), id, input)
        .await
        .map_err(ApiError::action(messages::BANNER_FAILED))?;
    if !updated {
        return Err(ApiError::NotFound(messages::BANNER_FAILED));
    }
    Ok(Json(ApiResponse::success(messages::BANNER_UPDATED.into())))
}

pub async fn get_country_discounts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<ApiResponse<Vec<ProductCountryGroup>>>> {
    owned_product(&state, &user, id).await?;
    let groups = state
        .platform
        .products
        .get_product_country_groups(&user.0, id)
        .await?;
    Ok(Json(ApiResponse::success(groups)))
}

pub async fn update_country_discounts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<ProductId>,
    Json(input): Json<CountryDiscountsInput>,
) -> ApiResult<Json<ApiResponse<ActionMessage>>> {
    let saved = state
        .platform
        .products
        .update_country_discounts(&user, id, input)
        .await
        .map_err(ApiError::action(messages::DISCOUNTS_FAILED))?;
    if !saved {
        return Err(ApiError::NotFound(messages::DISCOUNTS_FAILED));
    }
    Ok(Json(ApiResponse::success(messages::DISCOUNTS_SAVED.into())))
}

pub async fn embed_code(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<ApiResponse<EmbedCode>>> {
    owned_product(&state, &user, id).await?;
    Ok(Json(ApiResponse::success(EmbedCode {
        product_id: id,
        code: render_embed_code(&state.settings.server.public_url, id),
    })))
}
