//! Public banner script endpoint

use crate::error::ApiResult;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ORIGIN, REFERER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use easyppp_core::model::ProductId;
use easyppp_core::{BannerRequest, BannerResponse};
use std::sync::Arc;

fn header(headers: &HeaderMap, name: impl axum::http::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn serve_banner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProductId>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let banner_settings = &state.settings.banner;
    let request = BannerRequest {
        product_id: id,
        referer: header(&headers, REFERER).or_else(|| header(&headers, ORIGIN)),
        country_code: header(&headers, banner_settings.country_header.as_str())
            .or_else(|| banner_settings.test_country_code.clone()),
    };

    match state.platform.banner.serve_banner(request).await? {
        BannerResponse::Script(script) => Ok((
            [(CONTENT_TYPE, "text/javascript"), (CACHE_CONTROL, "no-store")],
            script,
        )
            .into_response()),
        BannerResponse::NotFound(reason) => {
            tracing::debug!(product_id = %id, reason = reason.as_str(), "banner not served");
            Ok(StatusCode::NOT_FOUND.into_response())
        }
    }
}
