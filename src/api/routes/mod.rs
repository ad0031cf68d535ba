//! API Routes Module
//!
//! Route handlers organized by surface:
//! - accounts: account commands and queries under `/rest/v1`
//! - monitoring: liveness, readiness and instance info

pub mod accounts;
pub mod monitoring;

pub use accounts::{accounts_router, AccountsState};
pub use monitoring::{monitoring_router, MonitoringState};
