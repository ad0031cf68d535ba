//! API error responses
//!
//! Every failure leaves the API as an [`ErrorResponse`] body with a status
//! derived from the error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::dto::ErrorResponse;
use crate::app::AppError;
use crate::logging::log_handler_failure;

/// Errors returned by API handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `X-User-ID` is absent or blank
    #[error("missing X-User-ID header")]
    MissingUser,

    /// Request failed input validation
    #[error("{0}")]
    Validation(String),

    /// The core rejected or failed the request
    #[error(transparent)]
    App(#[from] AppError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wrap a handler failure, logging it when it is the service's fault
    pub fn from_app(operation: &str, user: &str, err: AppError) -> Self {
        let api = Self::App(err);
        if api.status().is_server_error() {
            log_handler_failure(operation, user, api.code(), &api.to_string());
        }
        api
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUser | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::App(AppError::DuplicateAccount { .. }) => StatusCode::CONFLICT,
            ApiError::App(AppError::AccountNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingUser => "MISSING_USER",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::App(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::StoreError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::validation("bad").status(), StatusCode::BAD_REQUEST);

        let duplicate = ApiError::from(AppError::DuplicateAccount {
            user: "alice".into(),
            account: "A1".into(),
        });
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(duplicate.code(), "DUPLICATE_ACCOUNT");

        let missing = ApiError::from(AppError::AccountNotFound {
            user: "alice".into(),
            account: "A1".into(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let store = ApiError::from(AppError::TransientStore(StoreError::Database("io".into())));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.code(), "STORE_ERROR");
    }
}
