//! PKCE (RFC 7636) verifier and challenge generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const CHALLENGE_METHOD: &str = "S256";

/// Fixed verifier used in compatibility mode. Public and constant: it only
/// gives requests the shape the provider expects and protects nothing.
pub const COMPAT_VERIFIER: &str = "challenge";

/// `BASE64URL(SHA256("challenge"))`
pub const COMPAT_CHALLENGE: &str = "LdAL134CIs7YgmZUganB2fkHMJ0W4F7QB6HqY5KEd6k";

/// How verifiers are produced for an authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceMode {
    /// Fresh random verifier per attempt, bound through a real state store.
    Stored,
    /// Fixed verifier, no replay protection.
    Compatibility,
}

/// PKCE code verifier and challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
    pub method: &'static str,
}

impl PkcePair {
    /// Generate a new random pair
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            method: CHALLENGE_METHOD,
        }
    }

    /// The fixed compatibility pair.
    pub fn compatibility() -> Self {
        Self {
            verifier: COMPAT_VERIFIER.to_string(),
            challenge: COMPAT_CHALLENGE.to_string(),
            method: CHALLENGE_METHOD,
        }
    }

    pub fn for_mode(mode: PkceMode) -> Self {
        match mode {
            PkceMode::Stored => Self::generate(),
            PkceMode::Compatibility => Self::compatibility(),
        }
    }
}

/// 32 random bytes, base64url without padding (43 characters).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_generation() {
        let pkce1 = PkcePair::generate();
        let pkce2 = PkcePair::generate();

        assert_ne!(pkce1.verifier, pkce2.verifier);
        assert_ne!(pkce1.challenge, pkce2.challenge);
        assert_eq!(pkce1.method, "S256");
        assert_eq!(pkce1.challenge, challenge_for(&pkce1.verifier));
    }

    #[test]
    fn test_verifier_format() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_compatibility_pair_is_fixed_and_consistent() {
        // Not a security mechanism: the verifier is a published constant.
        let pair = PkcePair::for_mode(PkceMode::Compatibility);
        assert_eq!(pair, PkcePair::compatibility());
        assert_eq!(pair.verifier, "challenge");
        assert_eq!(pair.challenge, challenge_for(COMPAT_VERIFIER));
    }
}
