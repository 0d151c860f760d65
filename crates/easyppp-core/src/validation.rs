//! Request validation
//!
//! Every validator collects all field errors instead of stopping at the first.

use crate::model::CountryGroupId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single field failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collected field failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Message for `field`, if it failed
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Strip exactly one trailing slash
pub fn remove_trailing_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Trimmed value, `None` when blank
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ============ Product details ============

/// Raw product form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetailsInput {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Validated product form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
}

impl ProductDetailsInput {
    pub fn validate(self) -> Result<ProductDetails, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.chars().count() < 5 {
            errors.push("name", "Name must be atleast 5 characters long");
        }
        if self.url.is_empty() {
            errors.push("url", "Required");
        } else if url::Url::parse(&self.url).is_err() {
            errors.push("url", "Invalid url");
        }

        let url = remove_trailing_slash(&self.url).to_string();
        errors.into_result(ProductDetails {
            name: self.name,
            url,
            description: non_empty(self.description),
        })
    }
}

// ============ Customization ============

/// Raw banner customization form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomizationInput {
    #[serde(default)]
    pub class_prefix: Option<String>,
    pub background_color: String,
    pub text_color: String,
    pub font_size: String,
    pub location_message: String,
    pub banner_container: String,
    pub is_sticky: bool,
}

/// Validated customization update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomizationUpdate {
    pub class_prefix: Option<String>,
    pub background_color: String,
    pub text_color: String,
    pub font_size: String,
    pub location_message: String,
    pub banner_container: String,
    pub is_sticky: bool,
}

impl CustomizationInput {
    pub fn validate(self) -> Result<CustomizationUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("background_color", &self.background_color),
            ("text_color", &self.text_color),
            ("font_size", &self.font_size),
            ("location_message", &self.location_message),
            ("banner_container", &self.banner_container),
        ] {
            if value.is_empty() {
                errors.push(field, "Required");
            }
        }

        errors.into_result(CustomizationUpdate {
            class_prefix: non_empty(self.class_prefix),
            background_color: self.background_color,
            text_color: self.text_color,
            font_size: self.font_size,
            location_message: self.location_message,
            banner_container: self.banner_container,
            is_sticky: self.is_sticky,
        })
    }
}

// ============ Country discounts ============

/// Raw country discount form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryDiscountsInput {
    pub groups: Vec<CountryDiscountGroupInput>,
}

/// One row of the country discount form; percentage is 0..=100
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryDiscountGroupInput {
    pub country_group_id: String,
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    #[serde(default)]
    pub coupon: Option<String>,
}

/// Validated country discount row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDiscountGroup {
    pub country_group_id: CountryGroupId,
    pub discount_percentage: Option<f64>,
    pub coupon: Option<String>,
}

impl CountryDiscountsInput {
    pub fn validate(self) -> Result<Vec<CountryDiscountGroup>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut groups = Vec::with_capacity(self.groups.len());

        for (i, group) in self.groups.into_iter().enumerate() {
            let id = if group.country_group_id.is_empty() {
                errors.push(format!("groups.{i}.country_group_id"), "Required");
                None
            } else {
                match group.country_group_id.parse::<CountryGroupId>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        errors.push(format!("groups.{i}.country_group_id"), "Invalid id");
                        None
                    }
                }
            };

            let percentage = group.discount_percentage.filter(|p| !p.is_nan());
            if let Some(p) = percentage {
                if !(0.0..=100.0).contains(&p) {
                    errors.push(
                        format!("groups.{i}.discount_percentage"),
                        "Must be between 0 and 100",
                    );
                }
            }

            let coupon = non_empty(group.coupon);
            if coupon.is_some() && percentage.is_none() {
                errors.push(
                    format!("groups.{i}.root"),
                    "Discount percentage is required if coupon is provided",
                );
            }

            if let Some(country_group_id) = id {
                groups.push(CountryDiscountGroup {
                    country_group_id,
                    discount_percentage: percentage,
                    coupon,
                });
            }
        }

        errors.into_result(groups)
    }
}
