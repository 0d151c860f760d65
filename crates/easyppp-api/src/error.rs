//! API error type

use crate::billing::BillingError;
use crate::models::ApiResponse;
use crate::webhooks::WebhookError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use easyppp_core::ParityError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] ParityError),

    /// Domain failure reported with a fixed user-facing message
    #[error("{message}")]
    Action {
        source: ParityError,
        message: &'static str,
    },

    #[error("missing bearer token")]
    Unauthorized,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl ApiError {
    /// Server-side failures are reported as `message`; client errors keep their detail
    pub fn action(message: &'static str) -> impl FnOnce(ParityError) -> ApiError {
        move |source| {
            if classify(&source).0.is_server_error() {
                ApiError::Action { source, message }
            } else {
                ApiError::Domain(source)
            }
        }
    }
}

fn classify(err: &ParityError) -> (StatusCode, &'static str) {
    match err {
        ParityError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
        ParityError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        ParityError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
        ParityError::NoSubscription(_) => (StatusCode::FORBIDDEN, "no_subscription"),
        ParityError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ParityError::Dataset(_) | ParityError::Storage(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    }
}

fn envelope(
    status: StatusCode,
    code: &str,
    message: &str,
    source: Option<&ParityError>,
) -> Response {
    let mut body = ApiResponse::<()>::error(code, message);
    if let (Some(ParityError::Validation(errors)), Some(error)) = (source, body.error.as_mut()) {
        error.fields = Some(errors.errors().to_vec());
    }
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(err) => {
                let (status, code) = classify(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "request failed");
                }
                envelope(status, code, &err.to_string(), Some(&err))
            }
            ApiError::Action { source, message } => {
                let (status, code) = classify(&source);
                if status.is_server_error() {
                    tracing::error!(error = %source, user_message = message, "request failed");
                }
                envelope(status, code, message, Some(&source))
            }
            ApiError::Unauthorized => {
                envelope(StatusCode::UNAUTHORIZED, "unauthenticated", "Unauthorized", None)
            }
            ApiError::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "token rejected");
                envelope(StatusCode::UNAUTHORIZED, "invalid_token", "Unauthorized", None)
            }
            ApiError::NotFound(message) => {
                envelope(StatusCode::NOT_FOUND, "not_found", message, None)
            }
            ApiError::Webhook(err) => err.into_response(),
            ApiError::Billing(err) => {
                tracing::error!(error = %err, "billing provider call failed");
                envelope(StatusCode::BAD_GATEWAY, "billing_failed", &err.to_string(), None)
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Invalid settings found while building [`crate::AppState`]
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("{0} must not be empty")]
    EmptySecret(&'static str),

    #[error("{field}: {source}")]
    Webhook {
        field: &'static str,
        source: WebhookError,
    },
}
