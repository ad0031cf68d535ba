//! Application Error Types
//!
//! The outcomes a boundary layer has to tell apart. Store errors are
//! classified into these by the handlers, using only the store predicates.

use thiserror::Error;

use super::stores::{BoxError, StoreError};
use crate::domain::{AccountName, UserName};

/// Errors returned by command and query handlers
#[derive(Debug, Error)]
pub enum AppError {
    /// The user already has an account with this name
    #[error("account {account} already exists for user {user}")]
    DuplicateAccount { user: UserName, account: AccountName },

    /// The user has no account with this name
    #[error("account {account} not found for user {user}")]
    AccountNotFound { user: UserName, account: AccountName },

    /// Any other storage failure, including cancellation
    #[error("store error: {0}")]
    TransientStore(#[source] StoreError),

    /// Error raised by the query consumer, returned as-is
    #[error(transparent)]
    Consumer(BoxError),
}

impl AppError {
    /// Check if the caller may retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientStore(_))
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::DuplicateAccount { .. } => "DUPLICATE_ACCOUNT",
            AppError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            AppError::TransientStore(_) => "STORE_ERROR",
            AppError::Consumer(_) => "CONSUMER_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
