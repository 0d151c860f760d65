#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use easyppp_api::auth::Claims;
use easyppp_api::billing::RecordingBilling;
use easyppp_api::config::Settings;
use easyppp_api::webhooks::{StripeVerifier, SvixVerifier};
use easyppp_api::{build_router, AppState};
use easyppp_core::countries::{parse_dataset, DEFAULT_DATASET};
use easyppp_core::{Platform, TierName, UserId};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

pub const JWT_SECRET: &str = "integration-jwt-secret";
// base64("integration-identity-secret")
pub const IDENTITY_SECRET: &str = "whsec_aW50ZWdyYXRpb24taWRlbnRpdHktc2VjcmV0";
pub const BILLING_SECRET: &str = "whsec_integration_billing";
pub const BASIC_PRICE: &str = "price_basic";
pub const STANDARD_PRICE: &str = "price_standard";
pub const PREMIUM_PRICE: &str = "price_premium";
pub const PUBLIC_URL: &str = "https://app.easyppp.test";

pub struct TestApp {
    pub server: TestServer,
    pub platform: Platform,
    pub billing: Arc<RecordingBilling>,
}

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.public_url = PUBLIC_URL.into();
    settings.auth.jwt_secret = JWT_SECRET.into();
    settings.webhooks.identity_secret = IDENTITY_SECRET.into();
    settings.webhooks.billing_secret = BILLING_SECRET.into();
    settings.billing.basic_price_id = BASIC_PRICE.into();
    settings.billing.standard_price_id = STANDARD_PRICE.into();
    settings.billing.premium_price_id = PREMIUM_PRICE.into();
    settings
}

pub async fn spawn_app() -> TestApp {
    let platform = Platform::in_memory(PUBLIC_URL);
    platform
        .countries
        .import(&parse_dataset(DEFAULT_DATASET).unwrap())
        .await
        .unwrap();

    let billing = Arc::new(RecordingBilling::new());
    let state = AppState::new(platform.clone(), settings(), billing.clone()).unwrap();
    let server = TestServer::new(build_router(state)).unwrap();

    TestApp {
        server,
        platform,
        billing,
    }
}

impl TestApp {
    /// Register `user` on `tier` without going through the webhooks
    pub async fn subscribe(&self, user: &str, tier: TierName) {
        self.platform
            .subscriptions
            .create_user_subscription(&UserId::new(user), tier)
            .await
            .unwrap();
    }
}

pub fn token(sub: &str) -> String {
    let claims = Claims {
        sub: sub.into(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(sub: &str) -> (HeaderName, HeaderValue) {
    (
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token(sub))).unwrap(),
    )
}

pub fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static(name), HeaderValue::from_str(value).unwrap())
}

pub fn svix_headers(body: &[u8]) -> Vec<(HeaderName, HeaderValue)> {
    let verifier = SvixVerifier::new(IDENTITY_SECRET, 300).unwrap();
    let timestamp = chrono::Utc::now().timestamp();
    let signature = verifier.sign("msg_integration", timestamp, body).unwrap();
    vec![
        header("svix-id", "msg_integration"),
        header("svix-timestamp", &timestamp.to_string()),
        header("svix-signature", &signature),
    ]
}

pub fn stripe_signature(body: &[u8]) -> (HeaderName, HeaderValue) {
    let verifier = StripeVerifier::new(BILLING_SECRET, 300).unwrap();
    let signature = verifier.sign(chrono::Utc::now().timestamp(), body).unwrap();
    header("stripe-signature", &signature)
}
