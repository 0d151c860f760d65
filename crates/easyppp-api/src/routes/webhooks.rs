//! Identity and billing webhook endpoints

use crate::error::ApiResult;
use crate::webhooks::{
    parse_event, BillingEvent, BillingSubscription, IdentityEvent, SvixHeaders, WebhookError,
};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use easyppp_core::model::{SubscriptionFilter, SubscriptionPatch, UserId};
use easyppp_core::TierName;
use std::sync::Arc;

const RECEIVED: &str = "Webhook received";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/identity", post(identity_webhook))
        .route("/billing", post(billing_webhook))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub async fn identity_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, &'static str)> {
    let svix = SvixHeaders::from_headers(&headers)?;
    state.identity_webhooks.verify(&svix, &body, now())?;
    let event: IdentityEvent = parse_event(&body)?;

    match (event.kind.as_str(), event.data.id) {
        ("user.created", Some(id)) => {
            let user = UserId::new(id);
            state
                .platform
                .subscriptions
                .create_user_subscription(&user, TierName::Free)
                .await?;
        }
        ("user.deleted", Some(id)) => {
            let user = UserId::new(id);
            let billing_id = state
                .platform
                .subscriptions
                .get_user_subscription(&user)
                .await?
                .and_then(|s| s.billing_subscription_id);
            if let Some(billing_id) = billing_id {
                state.billing.cancel_subscription(&billing_id).await?;
            }
            state.platform.users.delete_user(&user).await?;
        }
        (kind, _) => tracing::debug!(kind, msg_id = %svix.id, "identity event ignored"),
    }

    Ok((StatusCode::OK, RECEIVED))
}

pub async fn billing_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, &'static str)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    state.billing_webhooks.verify(signature, &body, now())?;
    let event: BillingEvent = parse_event(&body)?;

    match event.kind.as_str() {
        "customer.subscription.created" => {
            subscription_created(&state, event.subscription()?).await?
        }
        "customer.subscription.updated" => {
            subscription_updated(&state, event.subscription()?).await?
        }
        "customer.subscription.deleted" => {
            subscription_deleted(&state, event.subscription()?).await?
        }
        kind => tracing::debug!(kind, "billing event ignored"),
    }

    Ok((StatusCode::OK, RECEIVED))
}

fn tier_of(state: &AppState, subscription: &BillingSubscription) -> Result<TierName, WebhookError> {
    let item = subscription
        .first_item()
        .ok_or_else(|| WebhookError::InvalidPayload("subscription has no items".into()))?;
    state
        .prices
        .tier_for_price(&item.price.id)
        .ok_or_else(|| WebhookError::InvalidPayload(format!("unknown price {}", item.price.id)))
}

async fn subscription_created(
    state: &AppState,
    subscription: BillingSubscription,
) -> ApiResult<()> {
    let user = subscription
        .metadata
        .user_id
        .clone()
        .ok_or_else(|| WebhookError::InvalidPayload("missing clerkUserId metadata".into()))?;
    let tier = tier_of(state, &subscription)?;
    let item_id = subscription.first_item().map(|item| item.id.clone());

    state
        .platform
        .subscriptions
        .update_user_subscription(
            &SubscriptionFilter::Owner(UserId::new(user)),
            SubscriptionPatch {
                tier: Some(tier),
                billing_customer_id: Some(Some(subscription.customer)),
                billing_subscription_id: Some(Some(subscription.id)),
                billing_subscription_item_id: Some(item_id),
            },
        )
        .await?;
    Ok(())
}

async fn subscription_updated(
    state: &AppState,
    subscription: BillingSubscription,
) -> ApiResult<()> {
    let tier = tier_of(state, &subscription)?;
    state
        .platform
        .subscriptions
        .update_user_subscription(
            &SubscriptionFilter::BillingCustomer(subscription.customer),
            SubscriptionPatch {
                tier: Some(tier),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

async fn subscription_deleted(
    state: &AppState,
    subscription: BillingSubscription,
) -> ApiResult<()> {
    state
        .platform
        .subscriptions
        .update_user_subscription(
            &SubscriptionFilter::BillingCustomer(subscription.customer),
            SubscriptionPatch {
                tier: Some(TierName::Free),
                billing_subscription_id: Some(None),
                billing_subscription_item_id: Some(None),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}
