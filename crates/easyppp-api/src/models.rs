//! API Models

use easyppp_core::analytics::ViewInterval;
use easyppp_core::model::{ProductCustomization, ProductId};
use easyppp_core::validation::FieldError;
use serde::{Deserialize, Serialize};

/// Standard API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorResponse {
                code: code.to_string(),
                message: message.to_string(),
                fields: None,
            }),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// Per-field validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// Outcome message of a mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMessage {
    pub message: String,
}

impl From<&str> for ActionMessage {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListProductsParams {
    pub limit: Option<usize>,
}

/// Customization plus the flags the editor needs
#[derive(Debug, Serialize, Deserialize)]
pub struct CustomizationView {
    pub customization: ProductCustomization,
    pub can_customize_banner: bool,
    pub can_remove_branding: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedCode {
    pub product_id: ProductId,
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    pub interval: Option<ViewInterval>,
    pub product_id: Option<ProductId>,
}
