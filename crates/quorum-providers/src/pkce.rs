//! PKCE utilities (RFC 7636) and random token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};

/// The code verifier length in bytes, before base64 encoding.
const CODE_VERIFIER_LENGTH: usize = 32;

/// A PKCE verifier/challenge pair.
#[derive(Debug)]
pub struct PkceFlow {
    /// High-entropy random string the callback proves possession of.
    pub verifier: String,
    /// SHA-256 hash of the verifier, base64url encoded.
    pub challenge: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a base64url-encoded random token from `bytes` random bytes.
pub fn random_token(bytes: usize) -> String {
    let mut rng = rand::rng();
    let raw: Vec<u8> = (0..bytes).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_length() {
        let flow = PkceFlow::new();
        // Base64 encoding of 32 bytes = 43 characters, no padding.
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn challenge_is_deterministic() {
        let a = PkceFlow::compute_challenge("test-verifier-string");
        let b = PkceFlow::compute_challenge("test-verifier-string");
        assert_eq!(a, b);
    }

    #[test]
    fn flows_are_distinct() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn random_tokens_differ() {
        assert_ne!(random_token(16), random_token(16));
    }
}
