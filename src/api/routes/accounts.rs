//! Account endpoints
//!
//! - `GET    /accounts`      list the caller's accounts with addresses
//! - `POST   /accounts`      create an account
//! - `GET    /accounts/:id`  one account with addresses
//! - `DELETE /accounts/:id`  delete an account
//!
//! The caller is identified by the `X-User-ID` header.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::time::Duration;

use crate::api::dto::{AccountResponse, AccountsResponse, CreateAccountRequest};
use crate::api::error::ApiError;
use crate::api::middleware::UserId;
use crate::api::validation::{validate_account_name, validate_xpub};
use crate::app::{
    AppError, Context, DeleteAccountCmd, GetAccountQuery, GetAccountsQuery, Handlers,
    NewAccountCmd, Visit, VisitResult,
};
use crate::domain::{Account, AccountAddresses, AccountName, AccountType};

/// State shared by the account endpoints
#[derive(Clone)]
pub struct AccountsState {
    pub handlers: Handlers,
    /// Deadline for the work of a single request
    pub request_timeout: Duration,
}

impl AccountsState {
    pub fn new(handlers: Handlers, request_timeout: Duration) -> Self {
        Self {
            handlers,
            request_timeout,
        }
    }

    fn context(&self) -> Context {
        Context::with_timeout(self.request_timeout)
    }
}

/// Create the accounts router, to be nested under `/rest/v1`
pub fn accounts_router(state: AccountsState) -> Router {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/:id", get(get_account).delete(delete_account))
        .with_state(state)
}

fn account_id(id: &str) -> Result<AccountName, ApiError> {
    validate_account_name(id)
        .into_result()
        .map_err(ApiError::Validation)?;
    Ok(AccountName::new(id))
}

/// GET /rest/v1/accounts
async fn list_accounts(
    State(state): State<AccountsState>,
    UserId(user): UserId,
) -> Result<Json<AccountsResponse>, ApiError> {
    let ctx = state.context();
    let mut accounts = Vec::new();
    let mut visitor = |aa: AccountAddresses| -> VisitResult {
        accounts.push(AccountResponse::from(aa));
        Ok(Visit::Continue)
    };

    let query = GetAccountsQuery { user: user.clone() };
    state
        .handlers
        .ask(&ctx, query.into(), &mut visitor)
        .await
        .map_err(|e| ApiError::from_app(GetAccountsQuery::ID.as_str(), user.as_str(), e))?;

    Ok(Json(AccountsResponse { accounts }))
}

/// POST /rest/v1/accounts
async fn create_account(
    State(state): State<AccountsState>,
    UserId(user): UserId,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    validate_account_name(&req.name)
        .merge(validate_xpub(&req.xpub))
        .into_result()
        .map_err(ApiError::Validation)?;

    let account_type = match req.account_type.as_deref() {
        Some(raw) => raw
            .parse::<AccountType>()
            .map_err(|e| ApiError::validation(e.to_string()))?,
        None => AccountType::Undefined,
    };

    let location = format!("/accounts/{}", req.name);
    let cmd = NewAccountCmd {
        account: Account::new(user.clone(), req.name, req.xpub, account_type),
    };

    state
        .handlers
        .execute(&state.context(), cmd.into())
        .await
        .map_err(|e| ApiError::from_app(NewAccountCmd::ID.as_str(), user.as_str(), e))?;

    tracing::info!(user = %user, location = %location, "account created");

    Ok((StatusCode::CREATED, [(header::CONTENT_LOCATION, location)]))
}

/// GET /rest/v1/accounts/:id
async fn get_account(
    State(state): State<AccountsState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let query = GetAccountQuery {
        user: user.clone(),
        account: account_id(&id)?,
    };

    let mut found = None;
    let mut visitor = |aa: AccountAddresses| -> VisitResult {
        found = Some(AccountResponse::from(aa));
        Ok(Visit::Stop)
    };

    state
        .handlers
        .ask(&state.context(), query.into(), &mut visitor)
        .await
        .map_err(|e| ApiError::from_app(GetAccountQuery::ID.as_str(), user.as_str(), e))?;

    // A successful single-account query always delivers its aggregate
    found.map(Json).ok_or_else(|| {
        ApiError::from(AppError::AccountNotFound {
            user,
            account: AccountName::new(id),
        })
    })
}

/// DELETE /rest/v1/accounts/:id
async fn delete_account(
    State(state): State<AccountsState>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cmd = DeleteAccountCmd {
        user: user.clone(),
        account: account_id(&id)?,
    };

    state
        .handlers
        .execute(&state.context(), cmd.into())
        .await
        .map_err(|e| ApiError::from_app(DeleteAccountCmd::ID.as_str(), user.as_str(), e))?;

    tracing::info!(user = %user, account = %id, "account deleted");

    Ok(StatusCode::NO_CONTENT)
}
