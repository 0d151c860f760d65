//! Webhook signature verification
//!
//! Two schemes are accepted:
//!
//! - identity events (Svix): `v1,<base64 HMAC-SHA256>` over `"{id}.{timestamp}.{body}"`
//! - billing events (Stripe): `t=<ts>,v1=<hex HMAC-SHA256>` over `"{t}.{body}"`
//!
//! Both reject timestamps outside the configured tolerance.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Error: Missing Svix headers")]
    MissingHeaders,

    #[error("Error: Missing signature header")]
    MissingSignature,

    #[error("Error: Verification error")]
    Verification(&'static str),

    #[error("Error: Invalid payload")]
    InvalidPayload(String),

    #[error("webhook secret is empty or not valid base64")]
    InvalidSecret,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match &self {
            WebhookError::Verification(reason) => {
                tracing::warn!(reason, "webhook verification failed")
            }
            WebhookError::InvalidPayload(reason) => {
                tracing::warn!(reason = %reason, "webhook payload rejected")
            }
            WebhookError::InvalidSecret => tracing::error!("webhook secret misconfigured"),
            _ => tracing::warn!(error = %self, "webhook rejected"),
        }
        let status = match self {
            WebhookError::InvalidSecret => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

fn within_tolerance(timestamp: i64, now: i64, tolerance: i64) -> bool {
    (now - timestamp).abs() <= tolerance
}

// ============ Identity (Svix) ============

/// Values of the `svix-*` headers
#[derive(Debug, Clone)]
pub struct SvixHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}

impl SvixHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, WebhookError> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(WebhookError::MissingHeaders)
        };
        Ok(Self {
            id: get("svix-id")?,
            timestamp: get("svix-timestamp")?,
            signature: get("svix-signature")?,
        })
    }
}

pub struct SvixVerifier {
    key: Vec<u8>,
    tolerance: i64,
}

impl SvixVerifier {
    /// `secret` is `whsec_<base64>`; the prefix is optional
    pub fn new(secret: &str, tolerance_secs: i64) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = STANDARD.decode(encoded).map_err(|_| WebhookError::InvalidSecret)?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }
        Ok(Self {
            key,
            tolerance: tolerance_secs,
        })
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| WebhookError::InvalidSecret)?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// Signature header value for `body`
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<String, WebhookError> {
        let mac = self.mac(id, &timestamp.to_string(), body)?;
        Ok(format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())))
    }

    pub fn verify(&self, headers: &SvixHeaders, body: &[u8], now: i64) -> Result<(), WebhookError> {
        let timestamp: i64 = headers
            .timestamp
            .parse()
            .map_err(|_| WebhookError::Verification("invalid timestamp"))?;
        if !within_tolerance(timestamp, now, self.tolerance) {
            return Err(WebhookError::Verification("timestamp outside tolerance"));
        }

        let mac = self.mac(&headers.id, &headers.timestamp, body)?;
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|candidate| candidate.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(WebhookError::Verification("no matching signature"))
        }
    }
}

// ============ Billing (Stripe) ============

pub struct StripeVerifier {
    secret: String,
    tolerance: i64,
}

impl StripeVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Result<Self, WebhookError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }
        Ok(Self {
            secret,
            tolerance: tolerance_secs,
        })
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::InvalidSecret)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// `stripe-signature` header value for `body`
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, WebhookError> {
        let mac = self.mac(&timestamp.to_string(), body)?;
        Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    pub fn verify(&self, header: &str, body: &[u8], now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let raw_timestamp = timestamp.ok_or(WebhookError::Verification("missing timestamp"))?;
        let parsed: i64 = raw_timestamp
            .parse()
            .map_err(|_| WebhookError::Verification("invalid timestamp"))?;
        if !within_tolerance(parsed, now, self.tolerance) {
            return Err(WebhookError::Verification("timestamp outside tolerance"));
        }
        if candidates.is_empty() {
            return Err(WebhookError::Verification("missing v1 signature"));
        }

        let mac = self.mac(raw_timestamp, body)?;
        let matched = candidates
            .into_iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(WebhookError::Verification("no matching signature"))
        }
    }
}

// ============ Payloads ============

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: IdentityEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEventData {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: BillingEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingEventData {
    pub object: serde_json::Value,
}

impl BillingEvent {
    /// Event object as a subscription; only valid for `customer.subscription.*`
    pub fn subscription(&self) -> Result<BillingSubscription, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingSubscription {
    pub id: String,
    pub customer: String,
    #[serde(default)]
    pub items: BillingItems,
    #[serde(default)]
    pub metadata: BillingMetadata,
}

impl BillingSubscription {
    pub fn first_item(&self) -> Option<&BillingItem> {
        self.items.data.first()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingItems {
    #[serde(default)]
    pub data: Vec<BillingItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingItem {
    pub id: String,
    pub price: BillingPrice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingPrice {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingMetadata {
    #[serde(rename = "clerkUserId")]
    pub user_id: Option<String>,
}

pub fn parse_event<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}
