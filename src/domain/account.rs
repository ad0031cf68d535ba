//! Account Domain Types
//!
//! Value types for users, Bitcoin accounts and their addresses. These carry
//! no behaviour beyond parsing and display; the rules about them live in the
//! application layer and the stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(
    /// Name of a user, unique per service instance
    UserName
);

string_newtype!(
    /// Name of an account, unique per user
    AccountName
);

string_newtype!(
    /// Extended public key (xpub, ypub, zpub, ...), opaque to the service
    XPub
);

string_newtype!(
    /// A Bitcoin address belonging to an account
    Address
);

/// Error returned when parsing an unknown account type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown account type: {0}")]
pub struct UnknownAccountType(pub String);

/// The script flavor of a Bitcoin account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountType {
    /// P2PKH, addresses start with 1
    Legacy,
    /// P2SH-wrapped segwit, addresses start with 3
    Segwit,
    /// P2WPKH, addresses start with bc1q
    NativeSegwit,
    /// P2TR, addresses start with bc1p
    Taproot,
    /// Not specified by the client
    #[default]
    Undefined,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Legacy,
        AccountType::Segwit,
        AccountType::NativeSegwit,
        AccountType::Taproot,
        AccountType::Undefined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Segwit => "segwit",
            Self::NativeSegwit => "native-segwit",
            Self::Taproot => "taproot",
            Self::Undefined => "undefined",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "segwit" => Ok(Self::Segwit),
            "native-segwit" | "native_segwit" => Ok(Self::NativeSegwit),
            "taproot" => Ok(Self::Taproot),
            "" | "undefined" => Ok(Self::Undefined),
            _ => Err(UnknownAccountType(s.to_string())),
        }
    }
}

/// A Bitcoin account owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    pub user: UserName,
    pub xpub: XPub,
    #[serde(rename = "type", default)]
    pub account_type: AccountType,
}

impl Account {
    pub fn new(
        user: impl Into<UserName>,
        name: impl Into<AccountName>,
        xpub: impl Into<XPub>,
        account_type: AccountType,
    ) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
            xpub: xpub.into(),
            account_type,
        }
    }
}

/// An account together with the addresses known for it
///
/// Built by the query path only; addresses are in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAddresses {
    pub account: AccountName,
    pub addresses: Vec<Address>,
}

impl AccountAddresses {
    pub fn empty(account: AccountName) -> Self {
        Self {
            account,
            addresses: Vec::new(),
        }
    }
}
