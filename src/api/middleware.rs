//! API Middleware - Request identity, correlation and security headers
//!
//! - `UserId` extractor for the `X-User-ID` header
//! - Correlation IDs and response logging per request
//! - Security headers

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use super::error::ApiError;
use super::validation::validate_user_id;
use crate::domain::UserName;
use crate::logging::{generate_correlation_id, log_api_response};

/// Header carrying the caller's user id
pub static USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Header carrying the correlation id
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

// ============================================================================
// User identity
// ============================================================================

/// The user a request acts for, taken from `X-User-ID`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub UserName);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::MissingUser)?;

        validate_user_id(raw)
            .into_result()
            .map_err(ApiError::Validation)?;

        Ok(UserId(UserName::new(raw)))
    }
}

// ============================================================================
// Correlation IDs
// ============================================================================

/// Assign a correlation id, log the response and echo the id back
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let correlation_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id);

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    log_api_response(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_millis() as u64,
        &correlation_id,
    );

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }

    response
}

// ============================================================================
// Security headers
// ============================================================================

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("cache-control", HeaderValue::from_static("no-store"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(UserId(user): UserId) -> String {
        user.into_inner()
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(request_id_middleware))
    }

    fn request(headers: &[(&str, &str)]) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_user_id_extracted() {
        let response = app()
            .oneshot(request(&[("X-User-ID", " alice ")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"alice");
    }

    #[tokio::test]
    async fn test_missing_or_blank_user_is_bad_request() {
        for headers in [vec![], vec![("X-User-ID", "  ")]] {
            let response = app().oneshot(request(&headers)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_request_id_echoed_or_generated() {
        let response = app()
            .oneshot(request(&[("X-User-ID", "alice"), ("X-Request-ID", "req-42")]))
            .await
            .unwrap();
        assert_eq!(response.headers()[&REQUEST_ID_HEADER], "req-42");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let response = app().oneshot(request(&[("X-User-ID", "alice")])).await.unwrap();
        let generated = response.headers()[&REQUEST_ID_HEADER].to_str().unwrap();
        assert_eq!(generated.len(), 36);
    }
}
