//! Domain Module
//!
//! Plain value types shared by every layer of the account service:
//! - users, accounts, addresses and the account/addresses aggregate
//! - command and query identifiers
//! - build and instance information

pub mod about;
pub mod account;
pub mod comms;

pub use about::{ServiceInstance, ServiceVersion};
pub use account::{
    Account, AccountAddresses, AccountName, AccountType, Address, UnknownAccountType, UserName,
    XPub,
};
pub use comms::{CommandId, QueryId};
