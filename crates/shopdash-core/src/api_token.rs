//! Tenant API tokens for the dashboard endpoints.
//!
//! Only the salted SHA-256 of a token is ever stored.

use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "sdk_";
const TOKEN_BYTES: usize = 32;

/// Generates a fresh random API token.
#[must_use]
pub fn generate_api_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    let mut token = String::with_capacity(TOKEN_PREFIX.len() + TOKEN_BYTES * 2);
    token.push_str(TOKEN_PREFIX);
    for byte in bytes {
        token.push_str(&format!("{byte:02x}"));
    }
    token
}

/// Hex SHA-256 of `salt || token`.
#[must_use]
pub fn hash_api_token(token: &str, salt: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    if let Some(salt) = salt {
        hasher.update(salt.as_bytes());
    }
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_prefixed_and_unique() {
        let a = generate_api_token();
        let b = generate_api_token();

        assert!(a.starts_with("sdk_"));
        assert_eq!(a.len(), 4 + 64);
        assert_ne!(a, b);
    }

    #[test]
    fn unsalted_hash_is_plain_sha256() {
        assert_eq!(
            hash_api_token("abc", None),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn salt_changes_the_hash() {
        assert_ne!(
            hash_api_token("abc", Some("pepper")),
            hash_api_token("abc", None)
        );
        assert_eq!(
            hash_api_token("abc", Some("pepper")),
            hash_api_token("pepperabc", None)
        );
    }
}
