//! Keychain storage for the GitHub token.
//!
//! Uses the system keychain (macOS Keychain, Linux Secret Service, Windows
//! Credential Manager) so the token survives between runs without living in
//! a dotfile.

use keyring::Entry;
use serde_json::Value;

use crate::error::{Error, ErrorCode, Result};

const SERVICE_NAME: &str = "imprint";
const GITHUB_TOKEN_KEY: &str = "github-token";

fn keyring_error(e: keyring::Error) -> Error {
    Error::new(
        ErrorCode::InternalUnexpected,
        format!("Keychain error: {}", e),
        Value::Null,
    )
}

/// Retrieve the stored GitHub token.
///
/// Returns `None` if no token has been stored.
pub fn get_github_token() -> Result<Option<String>> {
    let entry = Entry::new(SERVICE_NAME, GITHUB_TOKEN_KEY).map_err(keyring_error)?;

    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(keyring_error(e)),
    }
}

/// Store the GitHub token for later runs.
pub fn store_github_token(value: &str) -> Result<()> {
    let entry = Entry::new(SERVICE_NAME, GITHUB_TOKEN_KEY).map_err(keyring_error)?;
    entry.set_password(value).map_err(keyring_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires keychain access and may prompt for permissions.
    // Run manually with: cargo test keychain -- --ignored

    #[test]
    #[ignore]
    fn store_and_get_round_trip() {
        store_github_token("secret_value_123").unwrap();
        let retrieved = get_github_token().unwrap();
        assert_eq!(retrieved, Some("secret_value_123".to_string()));
    }
}
