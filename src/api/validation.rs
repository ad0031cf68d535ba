//! Input validation for request parameters
//!
//! Checks run at the boundary before anything reaches the handlers.

use bitcoin::base58;

/// Maximum length of a user id taken from `X-User-ID`
pub const MAX_USER_ID_LEN: usize = 128;

/// Maximum length of an account name
pub const MAX_ACCOUNT_NAME_LEN: usize = 64;

/// Serialized length of a BIP32 extended key
const EXTENDED_KEY_LEN: usize = 78;

/// Version prefixes of extended public keys
///
/// xpub, ypub, zpub (mainnet) and tpub, upub, vpub (testnet).
const EXTENDED_PUBKEY_VERSIONS: [[u8; 4]; 6] = [
    [0x04, 0x88, 0xB2, 0x1E],
    [0x04, 0x9D, 0x7C, 0xB2],
    [0x04, 0xB2, 0x47, 0x46],
    [0x04, 0x35, 0x87, 0xCF],
    [0x04, 0x4A, 0x52, 0x62],
    [0x04, 0x5F, 0x1C, 0xF6],
];

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![msg.into()],
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self
    }

    /// Convert into a `Result`, joining the messages
    pub fn into_result(self) -> Result<(), String> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.errors.join("; "))
        }
    }
}

/// Validate a user id
pub fn validate_user_id(user: &str) -> ValidationResult {
    if user.trim().is_empty() {
        return ValidationResult::error("User id is required");
    }

    if user.len() > MAX_USER_ID_LEN {
        return ValidationResult::error(format!(
            "User id must not exceed {} characters",
            MAX_USER_ID_LEN
        ));
    }

    if user.chars().any(char::is_control) {
        return ValidationResult::error("User id contains control characters");
    }

    ValidationResult::ok()
}

/// Validate an account name: 1-64 characters of `[A-Za-z0-9._-]`
pub fn validate_account_name(name: &str) -> ValidationResult {
    if name.is_empty() {
        return ValidationResult::error("Account name is required");
    }

    if name.len() > MAX_ACCOUNT_NAME_LEN {
        return ValidationResult::error(format!(
            "Account name must not exceed {} characters",
            MAX_ACCOUNT_NAME_LEN
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return ValidationResult::error(
            "Account name may only contain letters, digits, '.', '_' and '-'",
        );
    }

    ValidationResult::ok()
}

/// Validate a Base58Check encoded BIP32 extended public key
pub fn validate_xpub(xpub: &str) -> ValidationResult {
    if xpub.is_empty() {
        return ValidationResult::error("Extended public key is required");
    }

    let data = match base58::decode_check(xpub) {
        Ok(data) => data,
        Err(e) => return ValidationResult::error(format!("Invalid extended public key: {}", e)),
    };

    if data.len() != EXTENDED_KEY_LEN {
        return ValidationResult::error(format!(
            "Invalid extended public key length: {} bytes",
            data.len()
        ));
    }

    if !EXTENDED_PUBKEY_VERSIONS.iter().any(|v| data[..4] == v[..]) {
        return ValidationResult::error("Unknown extended public key version");
    }

    ValidationResult::ok()
}

/// Validate an address to attach to an account
pub fn validate_address(address: &str) -> ValidationResult {
    if address.trim().is_empty() {
        return ValidationResult::error("Address must not be empty");
    }

    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return ValidationResult::error("Address contains whitespace");
    }

    ValidationResult::ok()
}
