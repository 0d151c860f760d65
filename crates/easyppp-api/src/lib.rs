//! Easy PPP API
//!
//! Dashboard JSON API, the public banner script endpoint, and the identity
//! and billing webhooks.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  /api/products/*   /api/permissions   /api/analytics       │──► AuthUser (HS256)
//! │  /api/products/:id/banner                                  │──► public, referer + country header
//! │  /api/webhooks/identity   /api/webhooks/billing            │──► Svix / Stripe signatures
//! └──────────────────────────────┬─────────────────────────────┘
//!                                ▼
//!                     easyppp_core::Platform
//! ```

pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod webhooks;

use crate::auth::TokenVerifier;
use crate::billing::BillingProvider;
use crate::config::Settings;
use crate::webhooks::{StripeVerifier, SvixVerifier, WebhookError};
use axum::routing::get;
use axum::Router;
use easyppp_core::{Platform, PriceCatalog};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult, SetupError};
pub use models::*;

/// Shared handler state
pub struct AppState {
    pub platform: Platform,
    pub settings: Settings,
    pub tokens: TokenVerifier,
    pub identity_webhooks: SvixVerifier,
    pub billing_webhooks: StripeVerifier,
    pub billing: Arc<dyn BillingProvider>,
    pub prices: PriceCatalog,
}

impl AppState {
    pub fn new(
        platform: Platform,
        settings: Settings,
        billing: Arc<dyn BillingProvider>,
    ) -> Result<Self, SetupError> {
        let tolerance = settings.webhooks.tolerance_secs;
        Ok(Self {
            tokens: TokenVerifier::new(&settings.auth.jwt_secret, settings.auth.issuer.as_deref())?,
            identity_webhooks: SvixVerifier::new(&settings.webhooks.identity_secret, tolerance)
                .map_err(secret_error("webhooks.identity_secret"))?,
            billing_webhooks: StripeVerifier::new(
                settings.webhooks.billing_secret.clone(),
                tolerance,
            )
            .map_err(secret_error("webhooks.billing_secret"))?,
            prices: settings.billing.price_catalog(),
            platform,
            settings,
            billing,
        })
    }
}

fn secret_error(field: &'static str) -> impl FnOnce(WebhookError) -> SetupError {
    move |source| SetupError::Webhook { field, source }
}

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(Arc::new(state))
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tiers", get(routes::tiers::list_tiers))
        .route("/permissions", get(routes::permissions::get_permissions))
        .route("/analytics", get(routes::analytics::view_stats))
        .nest("/products", routes::products::router())
        .nest("/webhooks", routes::webhooks::router())
}
