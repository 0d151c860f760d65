//! Billing provider client

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("billing request failed: {0}")]
    Request(String),

    #[error("billing provider returned HTTP {status}")]
    Status { status: u16 },
}

/// Outbound calls to the payment provider
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError>;
}

/// Stripe REST API
pub struct StripeBilling {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeBilling {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BillingError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }
}

#[async_trait]
impl BillingProvider for StripeBilling {
    /// A subscription the provider no longer knows counts as cancelled
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError> {
        let resp = self
            .client
            .delete(format!("{}/v1/subscriptions/{}", self.api_base, subscription_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| BillingError::Request(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                tracing::info!(subscription_id, "billing subscription cancelled");
                Ok(())
            }
            reqwest::StatusCode::NOT_FOUND => {
                tracing::info!(subscription_id, "billing subscription already gone");
                Ok(())
            }
            status => Err(BillingError::Status {
                status: status.as_u16(),
            }),
        }
    }
}

/// Records cancellations instead of calling out
#[derive(Default)]
pub struct RecordingBilling {
    cancelled: Mutex<Vec<String>>,
}

impl RecordingBilling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl BillingProvider for RecordingBilling {
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), BillingError> {
        tracing::info!(subscription_id, "billing cancellation recorded");
        self.cancelled.lock().push(subscription_id.to_string());
        Ok(())
    }
}
