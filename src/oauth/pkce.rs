//! PKCE and state generation
//!
//! State and code verifier are 32 random bytes, base64url-encoded without
//! padding. Only the S256 challenge method is produced.

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

use crate::utils::crypto::generate_nonce;

/// Number of random bytes behind each state and code verifier
pub const RANDOM_VALUE_BYTES: usize = 32;

/// The only challenge method the agent sends
pub const CODE_CHALLENGE_METHOD: &str = "S256";

#[must_use]
pub fn generate_state() -> String {
    generate_nonce(RANDOM_VALUE_BYTES)
}

#[must_use]
pub fn generate_code_verifier() -> String {
    generate_nonce(RANDOM_VALUE_BYTES)
}

/// `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Fresh values for one login attempt
#[derive(Debug, Clone)]
pub struct PkceParameters {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParameters {
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        Self {
            state: generate_state(),
            code_challenge: code_challenge(&code_verifier),
            code_verifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_challenge_matches_rfc7636_example() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_values_are_url_safe_and_distinct() {
        let first = PkceParameters::generate();
        let second = PkceParameters::generate();

        for value in [&first.state, &first.code_verifier, &first.code_challenge] {
            assert_eq!(value.len(), 43);
            assert!(value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }

        assert_ne!(first.state, second.state);
        assert_ne!(first.code_verifier, second.code_verifier);
        assert_ne!(first.state, first.code_verifier);
        assert_eq!(first.code_challenge, code_challenge(&first.code_verifier));
    }
}
