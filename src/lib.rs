//! UTXO Tracker - Account Service
//!
//! Keeps, per user, a set of named Bitcoin accounts (each bound to an
//! extended public key) and the addresses already known for them.
//!
//! ## Layers
//!
//! 1. **Domain** - users, accounts, addresses and the account aggregate
//! 2. **Application** - command and query handlers over store traits,
//!    including the streaming group-by that turns joined rows into aggregates
//! 3. **Storage** - SQLite (r2d2 pool) and in-memory engines
//! 4. **API** - REST v1 and monitoring routers (axum)
//!
//! Address discovery and balances are out of scope: the service only
//! persists and serves addresses that are already known.

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod storage;

// Re-exports: application layer
pub use app::{
    AppError, AppResult, Command, Context, Handlers, Query, ReadStore, StoreError, Visit,
    VisitResult, WriteStore,
};

// Re-exports: domain
pub use domain::{Account, AccountAddresses, AccountName, AccountType, Address, UserName, XPub};

// Re-exports: storage engines
pub use storage::{AccountStore, MemoryAccountStore, SqliteAccountStore};

// Re-exports: process-level types
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
