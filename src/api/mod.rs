//! API Layer Module
//!
//! HTTP boundary of the account service: REST routes over the command and
//! query handlers, monitoring routes, middleware and server lifecycle.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod validation;

// Re-exports for convenience
pub use error::ApiError;
pub use routes::{AccountsState, MonitoringState};
pub use server::{api_router, monitoring_app, serve, shutdown_signal, API_PREFIX};
