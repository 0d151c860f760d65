//! Bearer token authentication
//!
//! Tokens are HS256 JWTs issued by the identity provider; `sub` is the user id.

use crate::error::{ApiError, SetupError};
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use easyppp_core::UserId;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Fails on an empty secret
    pub fn new(secret: &str, issuer: Option<&str>) -> Result<Self, SetupError> {
        if secret.is_empty() {
            return Err(SetupError::EmptySecret("auth.jwt_secret"));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::InvalidToken(e.to_string()))
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated caller; rejects with 401
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(ApiError::Unauthorized)?;
        let claims = state.tokens.verify(token)?;
        Ok(AuthUser(UserId::new(claims.sub)))
    }
}

/// Optional caller; invalid tokens count as anonymous
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserId>);

impl MaybeUser {
    pub fn user(&self) -> Option<&UserId> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer(parts)
            .and_then(|token| state.tokens.verify(token).ok())
            .map(|claims| UserId::new(claims.sub));
        Ok(MaybeUser(user))
    }
}
