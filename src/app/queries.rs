//! Query handlers: stream a user's accounts with their addresses

use std::sync::Arc;

use super::context::Context;
use super::error::{AppError, AppResult};
use super::stores::{ReadStore, StoreError, Visit, VisitResult};
use crate::domain::{AccountAddresses, AccountName, QueryId, UserName};

/// Every account of a user, in name order, with addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAccountsQuery {
    pub user: UserName,
}

impl GetAccountsQuery {
    pub const ID: QueryId = QueryId::new("GetAccounts");
}

/// A single account of a user, with addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAccountQuery {
    pub user: UserName,
    pub account: AccountName,
}

impl GetAccountQuery {
    pub const ID: QueryId = QueryId::new("GetAccount");
}

/// Classify a failed stream. Consumer errors come back exactly as raised.
fn classify(err: StoreError) -> AppError {
    match err {
        StoreError::VisitorAborted(inner) => AppError::Consumer(inner),
        other => AppError::TransientStore(other),
    }
}

/// Handles [`GetAccountsQuery`]
#[derive(Clone)]
pub struct GetAccountsHandler {
    store: Arc<dyn ReadStore>,
}

impl GetAccountsHandler {
    pub fn new(store: Arc<dyn ReadStore>) -> Self {
        Self { store }
    }

    /// Hand each aggregate to `visitor` as it is assembled
    ///
    /// A user with no accounts is not an error: the visitor is never called
    /// and the result is `Ok(())`.
    pub async fn handle(
        &self,
        ctx: &Context,
        query: GetAccountsQuery,
        visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
    ) -> AppResult<()> {
        self.store
            .stream_accounts_with_addresses(ctx, &query.user, visitor)
            .await
            .map_err(classify)
    }
}

/// Handles [`GetAccountQuery`]
///
/// Walks the same stream as [`GetAccountsHandler`] and stops at the match.
#[derive(Clone)]
pub struct GetAccountHandler {
    store: Arc<dyn ReadStore>,
}

impl GetAccountHandler {
    pub fn new(store: Arc<dyn ReadStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, ctx: &Context, query: GetAccountQuery) -> AppResult<AccountAddresses> {
        let mut found = None;
        let target = &query.account;
        let mut visitor = |aa: AccountAddresses| -> VisitResult {
            if &aa.account == target {
                found = Some(aa);
                Ok(Visit::Stop)
            } else {
                Ok(Visit::Continue)
            }
        };

        let streamed = self
            .store
            .stream_accounts_with_addresses(ctx, &query.user, &mut visitor)
            .await;

        let not_found = || AppError::AccountNotFound {
            user: query.user.clone(),
            account: query.account.clone(),
        };

        match streamed {
            Ok(()) => found.ok_or_else(not_found),
            Err(e) if self.store.is_not_found_error(&e) => Err(not_found()),
            Err(e) => Err(classify(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use async_trait::async_trait;
    use std::fmt;

    /// Replays fixed aggregates, honouring Stop and errors like a real store
    struct FixedStore {
        aggregates: Vec<AccountAddresses>,
        failure: Option<fn() -> StoreError>,
    }

    #[async_trait]
    impl ReadStore for FixedStore {
        async fn stream_accounts_with_addresses(
            &self,
            ctx: &Context,
            _user: &UserName,
            visitor: &mut (dyn FnMut(AccountAddresses) -> VisitResult + Send),
        ) -> Result<(), StoreError> {
            if let Some(failure) = self.failure {
                return Err(failure());
            }
            for aa in &self.aggregates {
                ctx.check()?;
                match visitor(aa.clone()).map_err(StoreError::VisitorAborted)? {
                    Visit::Continue => {}
                    Visit::Stop => break,
                }
            }
            Ok(())
        }
    }

    fn aggregate(name: &str, addresses: &[&str]) -> AccountAddresses {
        AccountAddresses {
            account: name.into(),
            addresses: addresses.iter().copied().map(Address::from).collect(),
        }
    }

    fn store() -> Arc<dyn ReadStore> {
        Arc::new(FixedStore {
            aggregates: vec![
                aggregate("A1", &["addr1", "addr2"]),
                aggregate("A2", &[]),
                aggregate("A3", &["addr9"]),
            ],
            failure: None,
        })
    }

    fn failing_store(failure: fn() -> StoreError) -> Arc<dyn ReadStore> {
        Arc::new(FixedStore {
            aggregates: Vec::new(),
            failure: Some(failure),
        })
    }

    fn query() -> GetAccountsQuery {
        GetAccountsQuery { user: "alice".into() }
    }

    #[derive(Debug)]
    struct Rejected;

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("rejected by consumer")
        }
    }

    impl std::error::Error for Rejected {}

    #[tokio::test]
    async fn test_get_accounts_delivers_all() {
        let handler = GetAccountsHandler::new(store());
        let mut seen = Vec::new();
        let mut visitor = |aa: AccountAddresses| -> VisitResult {
            seen.push(aa.account.into_inner());
            Ok(Visit::Continue)
        };

        handler
            .handle(&Context::background(), query(), &mut visitor)
            .await
            .unwrap();

        assert_eq!(seen, vec!["A1", "A2", "A3"]);
    }

    #[tokio::test]
    async fn test_get_accounts_stop_is_success() {
        let handler = GetAccountsHandler::new(store());
        let mut calls = 0;
        let mut visitor = |_: AccountAddresses| -> VisitResult {
            calls += 1;
            Ok(Visit::Stop)
        };

        let result = handler
            .handle(&Context::background(), query(), &mut visitor)
            .await;

        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_get_accounts_consumer_error_is_returned_as_is() {
        let handler = GetAccountsHandler::new(store());
        let mut visitor = |_: AccountAddresses| -> VisitResult { Err(Box::new(Rejected)) };

        let err = handler
            .handle(&Context::background(), query(), &mut visitor)
            .await
            .unwrap_err();

        match err {
            AppError::Consumer(inner) => assert!(inner.downcast_ref::<Rejected>().is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_accounts_store_failure_is_transient() {
        let handler = GetAccountsHandler::new(failing_store(|| {
            StoreError::Connection("pool exhausted".into())
        }));
        let mut visitor = |_: AccountAddresses| -> VisitResult { Ok(Visit::Continue) };

        let err = handler
            .handle(&Context::background(), query(), &mut visitor)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransientStore(StoreError::Connection(_))));
    }

    #[tokio::test]
    async fn test_get_accounts_cancelled_is_transient() {
        let handler = GetAccountsHandler::new(store());
        let ctx = Context::background();
        ctx.cancel();
        let mut visitor = |_: AccountAddresses| -> VisitResult { Ok(Visit::Continue) };

        let err = handler.handle(&ctx, query(), &mut visitor).await.unwrap_err();

        assert!(matches!(err, AppError::TransientStore(StoreError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_get_account_found() {
        let handler = GetAccountHandler::new(store());

        let aa = handler
            .handle(
                &Context::background(),
                GetAccountQuery {
                    user: "alice".into(),
                    account: "A3".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(aa, aggregate("A3", &["addr9"]));
    }

    #[tokio::test]
    async fn test_get_account_missing() {
        let handler = GetAccountHandler::new(store());

        let err = handler
            .handle(
                &Context::background(),
                GetAccountQuery {
                    user: "alice".into(),
                    account: "nope".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AccountNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_account_store_not_found_is_account_not_found() {
        let handler = GetAccountHandler::new(failing_store(|| StoreError::NotFound("alice".into())));

        let err = handler
            .handle(
                &Context::background(),
                GetAccountQuery {
                    user: "alice".into(),
                    account: "A1".into(),
                },
            )
            .await
            .unwrap_err();

        match err {
            AppError::AccountNotFound { user, account } => {
                assert_eq!(user.as_str(), "alice");
                assert_eq!(account.as_str(), "A1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_account_store_failure_is_transient() {
        let handler = GetAccountHandler::new(failing_store(|| {
            StoreError::Database("disk I/O error".into())
        }));

        let err = handler
            .handle(
                &Context::background(),
                GetAccountQuery {
                    user: "alice".into(),
                    account: "A1".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransientStore(StoreError::Database(_))));
    }
}
