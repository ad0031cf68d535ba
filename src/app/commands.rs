//! Command handlers: create and delete accounts

use std::sync::Arc;

use super::context::Context;
use super::error::{AppError, AppResult};
use super::stores::WriteStore;
use crate::domain::{Account, AccountName, CommandId, UserName};

/// Create an account, creating its user on first use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccountCmd {
    pub account: Account,
}

impl NewAccountCmd {
    pub const ID: CommandId = CommandId::new("NewAccount");
}

/// Delete one of a user's accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAccountCmd {
    pub user: UserName,
    pub account: AccountName,
}

impl DeleteAccountCmd {
    pub const ID: CommandId = CommandId::new("DeleteAccount");
}

/// Handles [`NewAccountCmd`]
#[derive(Clone)]
pub struct NewAccountHandler {
    store: Arc<dyn WriteStore>,
}

impl NewAccountHandler {
    pub fn new(store: Arc<dyn WriteStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, ctx: &Context, cmd: NewAccountCmd) -> AppResult<()> {
        match self.store.create_user_and_account(ctx, &cmd.account).await {
            Ok(()) => Ok(()),
            Err(e) if self.store.is_duplicate_error(&e) => Err(AppError::DuplicateAccount {
                user: cmd.account.user,
                account: cmd.account.name,
            }),
            Err(e) => Err(AppError::TransientStore(e)),
        }
    }
}

/// Handles [`DeleteAccountCmd`]
#[derive(Clone)]
pub struct DeleteAccountHandler {
    store: Arc<dyn WriteStore>,
}

impl DeleteAccountHandler {
    pub fn new(store: Arc<dyn WriteStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, ctx: &Context, cmd: DeleteAccountCmd) -> AppResult<()> {
        let not_found = || AppError::AccountNotFound {
            user: cmd.user.clone(),
            account: cmd.account.clone(),
        };

        match self.store.delete_account(ctx, &cmd.user, &cmd.account).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(not_found()),
            Err(e) if self.store.is_not_found_error(&e) => Err(not_found()),
            Err(e) => Err(AppError::TransientStore(e)),
        }
    }
}
