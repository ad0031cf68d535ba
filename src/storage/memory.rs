//! In-Memory Storage Implementation
//!
//! Provides in-memory account storage for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::app::aggregate::{stream_grouped, AccountRow};
use crate::app::context::Context;
use crate::app::stores::{ReadStore, StoreError, StoreResult, VisitResult, WriteStore};
use crate::domain::{Account, AccountAddresses, AccountName, AccountType, Address, UserName, XPub};

#[derive(Debug, Clone)]
struct StoredAccount {
    id: i64,
    xpub: XPub,
    account_type: AccountType,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<UserName, i64>,
    /// Keyed by (user id, account name) so a user's accounts are contiguous and name-ordered
    accounts: BTreeMap<(i64, AccountName), StoredAccount>,
    addresses: BTreeMap<i64, BTreeSet<Address>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn account_id(&self, user: &UserName, account: &AccountName) -> Option<i64> {
        let user_id = *self.users.get(user)?;
        self.accounts
            .get(&(user_id, account.clone()))
            .map(|stored| stored.id)
    }

    /// The outer join of a user's accounts and addresses, sorted by account then address
    fn rows(&self, user_id: i64) -> impl Iterator<Item = AccountRow> + '_ {
        self.accounts
            .range((user_id, AccountName::new(""))..)
            .take_while(move |((owner, _), _)| *owner == user_id)
            .flat_map(move |((_, name), stored)| {
                let addresses: Vec<Option<&Address>> = match self.addresses.get(&stored.id) {
                    Some(set) if !set.is_empty() => set.iter().map(Some).collect(),
                    _ => vec![None],
                };
                addresses
                    .into_iter()
                    .map(move |address| AccountRow::new(stored.id, name.clone(), address.cloned()))
            })
    }
}

/// In-memory account store
///
/// Thread-safe storage with the same observable behaviour as the SQLite
/// store. Uses Arc<RwLock<>> for concurrent access.
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    state: Arc<RwLock<State>>,
}

impl MemoryAccountStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach addresses to an existing account
    ///
    /// Addresses already attached are skipped. Returns how many were new.
    pub async fn add_addresses(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
        addresses: &[Address],
    ) -> StoreResult<usize> {
        ctx.check()?;
        let mut state = self.state.write().await;

        let account_id = state
            .account_id(user, account)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", user, account)))?;

        let set = state.addresses.entry(account_id).or_default();
        let added = addresses
            .iter()
            .filter(|a| !a.as_str().is_empty())
            .filter(|a| set.insert((*a).clone()))
            .count();

        Ok(added)
    }

    /// Look up an account with its stored key and type
    pub async fn account(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
    ) -> StoreResult<Option<Account>> {
        ctx.check()?;
        let state = self.state.read().await;

        let user_id = match state.users.get(user) {
            Some(id) => *id,
            None => return Ok(None),
        };

        Ok(state
            .accounts
            .get(&(user_id, account.clone()))
            .map(|stored| {
                Account::new(
                    user.clone(),
                    account.clone(),
                    stored.xpub.clone(),
                    stored.account_type,
                )
            }))
    }

    /// Always reachable
    pub async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl WriteStore for MemoryAccountStore {
    async fn create_user_and_account(&self, ctx: &Context, account: &Account) -> StoreResult<()> {
        ctx.check()?;
        let mut state = self.state.write().await;

        // Check for a clash before touching anything, so a failure leaves no user behind
        if state.account_id(&account.user, &account.name).is_some() {
            return Err(StoreError::Duplicate(format!("{}/{}", account.user, account.name)));
        }

        let existing = state.users.get(&account.user).copied();
        let user_id = match existing {
            Some(id) => id,
            None => {
                let id = state.next_id();
                state.users.insert(account.user.clone(), id);
                id
            }
        };

        let id = state.next_id();
        state.accounts.insert(
            (user_id, account.name.clone()),
            StoredAccount {
                id,
                xpub: account.xpub.clone(),
                account_type: account.account_type,
            },
        );

        Ok(())
    }

    async fn delete_account(
        &self,
        ctx: &Context,
        user: &UserName,
        account: &AccountName,
    ) -> StoreResult<bool> {
        ctx.check()?;
        let mut state = self.state.write().await;

        let user_id = match state.users.get(user) {
            Some(id) => *id,
            None => return Ok(false),
        };

        match state.accounts.remove(&(user_id, account.clone())) {
            Some(stored) => {
                state.addresses.remove(&stored.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ReadStore for MemoryAccountStore {
    async fn stream_accounts_with_addresses(
        &self,
        ctx: &Context,
        user: &UserName,
        visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    ) -> StoreResult<()> {
        ctx.check()?;
        let state = self.state.read().await;

        let user_id = match state.users.get(user) {
            Some(id) => *id,
            None => return Ok(()),
        };

        stream_grouped(ctx, state.rows(user_id).map(Ok), visitor)
    }
}
