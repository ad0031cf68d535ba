//! Storage Layer Module
//!
//! Provides persistence for users, accounts and their addresses.
//!
//! This module contains:
//! - SQLite implementation for production
//! - In-memory implementation for testing
//!
//! Both implement the `WriteStore` and `ReadStore` traits from the
//! application layer.

pub mod memory;
pub mod sqlite;

use crate::app::context::Context;
use crate::app::stores::{ReadStore, StoreResult, WriteStore};
use crate::domain::{Account, AccountName, Address, UserName};
use std::sync::Arc;

// Re-exports for convenience
pub use memory::MemoryAccountStore;
pub use sqlite::SqliteAccountStore;

/// A concrete account store selected at startup
#[derive(Clone)]
pub enum AccountStore {
    Sqlite(Arc<SqliteAccountStore>),
    Memory(MemoryAccountStore),
}

impl AccountStore {
    /// Open the SQLite store at `path` (`:memory:` for a throwaway database)
    pub fn sqlite(path: &str, pool_size: u32) -> StoreResult<Self> {
        Ok(Self::Sqlite(Arc::new(SqliteAccountStore::open(path, pool_size)?)))
    }

    pub fn memory() -> Self {
        Self::Memory(MemoryAccountStore::new())
    }

    pub fn write_store(&self) -> Arc<dyn WriteStore> {
        match self {
            Self::Sqlite(store) => store.clone(),
            Self::Memory(store) => Arc::new(store.clone()),
        }
    }

    pub fn read_store(&self) -> Arc<dyn ReadStore> {
        match self {
            Self::Sqlite(store) => store.clone(),
            Self::Memory(store) => Arc::new(store.clone()),
        }
    }

    pub async fn add_addresses(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
        addresses: &[Address],
    ) -> StoreResult<usize> {
        match self {
            Self::Sqlite(store) => store.add_addresses(ctx, user, account, addresses).await,
            Self::Memory(store) => store.add_addresses(ctx, user, account, addresses).await,
        }
    }

    pub async fn account(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
    ) -> StoreResult<Option<Account>> {
        match self {
            Self::Sqlite(store) => store.account(ctx, user, account).await,
            Self::Memory(store) => store.account(ctx, user, account).await,
        }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        match self {
            Self::Sqlite(store) => store.ping().await,
            Self::Memory(store) => store.ping().await,
        }
    }
}
