//! Request and response bodies of the REST API

use serde::{Deserialize, Serialize};

use crate::domain::AccountAddresses;

/// Body of `POST /rest/v1/accounts`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub xpub: String,
    /// Account type; `undefined` when omitted
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
}

/// One account with its addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    /// The account name doubles as its id within a user
    pub id: String,
    pub name: String,
    pub addresses: Vec<String>,
}

impl From<AccountAddresses> for AccountResponse {
    fn from(aa: AccountAddresses) -> Self {
        let name = aa.account.into_inner();
        Self {
            id: name.clone(),
            name,
            addresses: aa.addresses.into_iter().map(|a| a.into_inner()).collect(),
        }
    }
}

/// Body of `GET /rest/v1/accounts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsResponse {
    pub accounts: Vec<AccountResponse>,
}

/// Error body of every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
