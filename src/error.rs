//! Service Error Types
//!
//! Errors of the binary's startup and CLI paths. Request handling uses
//! [`AppError`](crate::app::AppError) instead.

use thiserror::Error;

use crate::app::{AppError, StoreError};

/// Root error type for the account service process
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A command or query run from the CLI failed
    #[error("{0}")]
    Command(#[from] AppError),

    /// Invalid CLI input
    #[error("validation error: {0}")]
    Validation(String),
}

impl ServiceError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::Config(_) | ServiceError::Validation(_) => 2,
            ServiceError::Command(AppError::DuplicateAccount { .. })
            | ServiceError::Command(AppError::AccountNotFound { .. }) => 3,
            _ => 1,
        }
    }
}

/// Result type alias using ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = ServiceError::from(AppError::AccountNotFound {
            user: "alice".into(),
            account: "A1".into(),
        });
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "account A1 not found for user alice");

        let err = ServiceError::from(StoreError::Connection("refused".into()));
        assert_eq!(err.exit_code(), 1);

        assert_eq!(ServiceError::validation("bad name").exit_code(), 2);
    }
}
