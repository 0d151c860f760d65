//! API Routes

pub mod analytics;
pub mod banner;
pub mod health;
pub mod permissions;
pub mod products;
pub mod tiers;
pub mod webhooks;
