//! Handler registry
//!
//! Wires the handlers to their stores once at startup and routes commands and
//! queries to them by kind.

use std::sync::Arc;

use super::commands::{DeleteAccountCmd, DeleteAccountHandler, NewAccountCmd, NewAccountHandler};
use super::context::Context;
use super::error::{AppError, AppResult};
use super::queries::{GetAccountHandler, GetAccountQuery, GetAccountsHandler, GetAccountsQuery};
use super::stores::{ReadStore, VisitResult, WriteStore};
use crate::domain::{AccountAddresses, CommandId, QueryId};

/// Any state-changing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewAccount(NewAccountCmd),
    DeleteAccount(DeleteAccountCmd),
}

impl Command {
    pub fn id(&self) -> CommandId {
        match self {
            Command::NewAccount(_) => NewAccountCmd::ID,
            Command::DeleteAccount(_) => DeleteAccountCmd::ID,
        }
    }
}

impl From<NewAccountCmd> for Command {
    fn from(cmd: NewAccountCmd) -> Self {
        Command::NewAccount(cmd)
    }
}

impl From<DeleteAccountCmd> for Command {
    fn from(cmd: DeleteAccountCmd) -> Self {
        Command::DeleteAccount(cmd)
    }
}

/// Any read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    GetAccounts(GetAccountsQuery),
    GetAccount(GetAccountQuery),
}

impl Query {
    pub fn id(&self) -> QueryId {
        match self {
            Query::GetAccounts(_) => GetAccountsQuery::ID,
            Query::GetAccount(_) => GetAccountQuery::ID,
        }
    }
}

impl From<GetAccountsQuery> for Query {
    fn from(query: GetAccountsQuery) -> Self {
        Query::GetAccounts(query)
    }
}

impl From<GetAccountQuery> for Query {
    fn from(query: GetAccountQuery) -> Self {
        Query::GetAccount(query)
    }
}

/// All handlers, bound to their stores
#[derive(Clone)]
pub struct Handlers {
    pub new_account: NewAccountHandler,
    pub delete_account: DeleteAccountHandler,
    pub get_accounts: GetAccountsHandler,
    pub get_account: GetAccountHandler,
}

impl Handlers {
    pub fn new(write: Arc<dyn WriteStore>, read: Arc<dyn ReadStore>) -> Self {
        Self {
            new_account: NewAccountHandler::new(write.clone()),
            delete_account: DeleteAccountHandler::new(write),
            get_accounts: GetAccountsHandler::new(read.clone()),
            get_account: GetAccountHandler::new(read),
        }
    }

    /// Run a command
    pub async fn execute(&self, ctx: &Context, command: Command) -> AppResult<()> {
        let id = command.id();
        let result = match command {
            Command::NewAccount(cmd) => self.new_account.handle(ctx, cmd).await,
            Command::DeleteAccount(cmd) => self.delete_account.handle(ctx, cmd).await,
        };

        if let Err(e) = &result {
            tracing::debug!(command = %id, error = %e, "command failed");
        }
        result
    }

    /// Run a query, handing each resulting aggregate to `visitor`
    ///
    /// A single-account query calls the visitor exactly once on success.
    pub async fn ask(
        &self,
        ctx: &Context,
        query: Query,
        visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    ) -> AppResult<()> {
        let id = query.id();
        let result = match query {
            Query::GetAccounts(q) => self.get_accounts.handle(ctx, q, visitor).await,
            Query::GetAccount(q) => match self.get_account.handle(ctx, q).await {
                Ok(aa) => visitor(aa).map(|_| ()).map_err(AppError::Consumer),
                Err(e) => Err(e),
            },
        };

        if let Err(e) = &result {
            tracing::debug!(query = %id, error = %e, "query failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::stores::{MockWriteStore, StoreError, Visit};
    use crate::domain::{Account, AccountType, UserName};
    use async_trait::async_trait;

    struct OneAccount;

    #[async_trait]
    impl ReadStore for OneAccount {
        async fn stream_accounts_with_addresses(
            &self,
            _ctx: &Context,
            _user: &UserName,
            visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
        ) -> Result<(), StoreError> {
            visitor(AccountAddresses::empty("A1".into()))
                .map(|_| ())
                .map_err(StoreError::VisitorAborted)
        }
    }

    fn handlers(write: MockWriteStore) -> Handlers {
        Handlers::new(Arc::new(write), Arc::new(OneAccount))
    }

    #[test]
    fn test_ids() {
        let cmd: Command = DeleteAccountCmd {
            user: "u".into(),
            account: "a".into(),
        }
        .into();
        assert_eq!(cmd.id().as_str(), "DeleteAccount");

        let query: Query = GetAccountsQuery { user: "u".into() }.into();
        assert_eq!(query.id().as_str(), "GetAccounts");
    }

    #[tokio::test]
    async fn test_execute_routes_new_account() {
        let mut write = MockWriteStore::new();
        write
            .expect_create_user_and_account()
            .times(1)
            .returning(|_, _| Ok(()));

        let cmd = NewAccountCmd {
            account: Account::new("u", "a", "xpub", AccountType::Taproot),
        };

        handlers(write)
            .execute(&Context::background(), cmd.into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_execute_routes_delete_account() {
        let mut write = MockWriteStore::new();
        write.expect_delete_account().times(1).returning(|_, _, _| Ok(false));

        let cmd = DeleteAccountCmd {
            user: "u".into(),
            account: "a".into(),
        };
        let err = handlers(write)
            .execute(&Context::background(), cmd.into())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AccountNotFound { .. }));
    }

    #[tokio::test]
    async fn test_ask_single_account_calls_visitor_once() {
        let mut calls = 0;
        let mut visitor = |aa: AccountAddresses| -> VisitResult {
            calls += 1;
            assert_eq!(aa.account.as_str(), "A1");
            Ok(Visit::Continue)
        };

        let query = GetAccountQuery {
            user: "u".into(),
            account: "A1".into(),
        };
        handlers(MockWriteStore::new())
            .ask(&Context::background(), query.into(), &mut visitor)
            .await
            .unwrap();

        assert_eq!(calls, 1);
    }
}
