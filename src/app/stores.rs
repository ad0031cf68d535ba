//! Store Trait Definitions
//!
//! The storage collaborators the application layer depends on. Implementations
//! translate their engine's errors into [`StoreError`] and nothing above this
//! boundary looks at engine-specific errors.
//!
//! Implementations:
//! - `SqliteAccountStore` - Production storage with SQLite
//! - `MemoryAccountStore` - In-memory storage for testing

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::context::Context;
use crate::domain::{Account, AccountAddresses, AccountName, UserName};

/// Boxed error raised by a consumer of a query stream
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The row visitor returned an error; carried through untouched
    #[error("Iteration aborted by visitor: {0}")]
    VisitorAborted(#[source] BoxError),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What a visitor wants after receiving an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Deliver the next aggregate
    Continue,
    /// End iteration now; the caller sees success
    Stop,
}

/// Outcome of one visitor call: continue, stop early, or abort with an error
pub type VisitResult = Result<Visit, BoxError>;

/// Write side of the account store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WriteStore: Send + Sync {
    /// Ensure the account's user exists and insert the account, atomically
    ///
    /// A clash on (user, account name) must fail with an error for which
    /// [`WriteStore::is_duplicate_error`] is true, leaving no partial state.
    async fn create_user_and_account(&self, ctx: &Context, account: &Account) -> StoreResult<()>;

    /// Delete one user's account
    ///
    /// Returns `Ok(false)` when no such account existed.
    async fn delete_account(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
    ) -> StoreResult<bool>;

    /// Whether the error is a clash on an existing account
    fn is_duplicate_error(&self, err: &StoreError) -> bool {
        matches!(err, StoreError::Duplicate(_))
    }

    /// Whether the error means the record does not exist
    fn is_not_found_error(&self, err: &StoreError) -> bool {
        matches!(err, StoreError::NotFound(_))
    }
}

/// Read side of the account store
#[async_trait]
pub trait ReadStore: Send + Sync {
    /// Stream a user's accounts with their addresses, one aggregate per account
    ///
    /// Aggregates arrive in ascending account name order, each with its
    /// addresses ascending. Accounts without addresses are delivered with an
    /// empty list. When the visitor returns [`Visit::Stop`] the call ends with
    /// `Ok(())`; when it returns an error the call ends with
    /// [`StoreError::VisitorAborted`] wrapping that same error. The context is
    /// checked between rows.
    async fn stream_accounts_with_addresses(
        &self,
        ctx: &Context,
        user: &UserName,
        visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    ) -> StoreResult<()>;

    /// Whether the error means the record does not exist
    fn is_not_found_error(&self, err: &StoreError) -> bool {
        matches!(err, StoreError::NotFound(_))
    }
}
