//! Easy PPP Core
//!
//! Regional pricing discounts based on purchasing power parity.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           SERVICES                                │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌─────────────────┐   │
//! │  │ Products │  │  Banner  │  │ Analytics │  │ Subscriptions/  │   │
//! │  │          │  │ pipeline │  │           │  │ Users/Countries │   │
//! │  └────┬─────┘  └────┬─────┘  └─────┬─────┘  └────────┬────────┘   │
//! │       └─────────────┴──── PermissionEvaluator ───────┘            │
//! │                                  │                                │
//! │  ┌───────────────────────────────▼──────────────────────────────┐ │
//! │  │        TagCache (global / user / id tags over moka)          │ │
//! │  └───────────────────────────────┬──────────────────────────────┘ │
//! │  ┌───────────────────────────────▼──────────────────────────────┐ │
//! │  │            Store (repository traits, in-memory impl)         │ │
//! │  └──────────────────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

pub mod analytics;
pub mod banner;
pub mod cache;
pub mod countries;
pub mod discount;
pub mod error;
pub mod memory;
pub mod model;
pub mod permissions;
pub mod platform;
pub mod products;
pub mod store;
pub mod subscriptions;
pub mod tiers;
pub mod users;
pub mod validation;

pub use banner::{BannerRequest, BannerResponse, NotFoundReason};
pub use cache::{CacheKind, CacheTag, TagCache};
pub use discount::{resolve_discount, DiscountSource, ResolvedDiscount};
pub use error::{DatasetError, ParityError, ParityResult};
pub use memory::InMemoryStore;
pub use model::*;
pub use permissions::PermissionSet;
pub use platform::Platform;
pub use store::Store;
pub use tiers::{PriceCatalog, SubscriptionTier, TierName};
pub use validation::{ValidationErrors, remove_trailing_slash};
