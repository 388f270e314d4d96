//! # AppError
//!
//! Centralized error handling for the comment and conversation engines.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Comment, Post, Message, Conversation)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Caller is not the author/owner of the record they are mutating
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A reply would exceed the maximum nesting depth
    #[error("reply depth {depth} exceeds the maximum of {max}")]
    DepthLimitExceeded { depth: u32, max: u32 },

    /// Operation not allowed against the entity's current state
    /// (e.g., voting on a soft-deleted comment)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Conversation policy rejection (e.g., sending before mutual acceptance)
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Infrastructure failure (e.g., storage adapter error)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for the common "entity X with id Y" lookup failure.
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }
}

/// Storage adapters report through `anyhow`; anything that bubbles up
/// uncategorized is an infrastructure failure from the domain's view.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, AppError>;
