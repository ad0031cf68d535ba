//! Application layer
//!
//! Commands and queries over the account store. Handlers depend only on the
//! [`WriteStore`] and [`ReadStore`] traits and classify every store failure
//! into an [`AppError`].

pub mod aggregate;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod queries;
pub mod stores;

pub use aggregate::{stream_grouped, AccountGrouper, AccountRow};
pub use commands::{DeleteAccountCmd, DeleteAccountHandler, NewAccountCmd, NewAccountHandler};
pub use context::Context;
pub use dispatch::{Command, Handlers, Query};
pub use error::{AppError, AppResult};
pub use queries::{GetAccountHandler, GetAccountQuery, GetAccountsHandler, GetAccountsQuery};
pub use stores::{BoxError, ReadStore, StoreError, StoreResult, Visit, VisitResult, WriteStore};
