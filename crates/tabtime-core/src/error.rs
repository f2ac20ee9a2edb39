//! Domain-specific error types following panic-free policy.

use crate::ContextId;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Context id is the browser's "no tab" sentinel
    #[error("Invalid context id: {context_id}")]
    InvalidContext { context_id: ContextId },

    /// URL cannot be attributed to a website
    #[error("Untrackable URL: {url}")]
    UntrackableUrl { url: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
