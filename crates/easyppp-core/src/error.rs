//! Error types for Easy PPP

use crate::model::UserId;
use crate::validation::ValidationErrors;
use thiserror::Error;

/// Easy PPP error type
#[derive(Error, Debug, Clone)]
pub enum ParityError {
    /// Input failed validation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No identity attached to the request
    #[error("unauthenticated")]
    Unauthenticated,

    /// The user's tier does not allow the action
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// Entity missing or not owned by the caller
    #[error("not found: {0}")]
    NotFound(String),

    /// The user has no subscription row
    #[error("user {0} has no subscription")]
    NoSubscription(UserId),

    /// Dataset import problem
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Storage failure
    #[error("storage error: {0}")]
    Storage(String),
}

/// Country dataset import errors
#[derive(Error, Debug, Clone)]
pub enum DatasetError {
    /// A country references a group that is not stored
    #[error("country group {0} not found")]
    GroupNotFound(String),

    /// The dataset is not valid JSON
    #[error("malformed dataset: {0}")]
    Malformed(String),
}

/// Result type for Easy PPP
pub type ParityResult<T> = Result<T, ParityError>;
