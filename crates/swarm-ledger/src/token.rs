//! Pairing token generation
//!
//! Pairing tokens are the shared secret a SwarmCluster hands to the ledger
//! session and to registering nodes. They are cryptographically secure random
//! strings, generated once per cluster and never rotated.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

/// Number of random bytes in a pairing token
pub const TOKEN_BYTES: usize = 32;

/// Error type for token generation failures
#[derive(Debug, Error)]
#[error("failed to generate cryptographically secure random bytes: RNG unavailable")]
pub struct TokenGenerationError;

/// A pairing token correlating a cluster with its ledger sessions
#[derive(Clone)]
pub struct PairingToken {
    raw: Vec<u8>,
    string: String,
}

impl PairingToken {
    /// Generate a new random pairing token
    ///
    /// # Panics
    ///
    /// Panics if the cryptographic RNG fails. Without working randomness no
    /// token handed out by this process could be trusted.
    pub fn generate() -> Self {
        Self::try_generate().unwrap_or_else(|e| {
            panic!(
                "CRITICAL: {}. The system cannot operate securely without \
                 a working cryptographic random number generator.",
                e
            )
        })
    }

    fn try_generate() -> Result<Self, TokenGenerationError> {
        let mut raw = vec![0u8; TOKEN_BYTES];
        aws_lc_rs::rand::fill(&mut raw).map_err(|_| TokenGenerationError)?;
        let string = URL_SAFE_NO_PAD.encode(&raw);
        Ok(Self { raw, string })
    }

    /// Get the token as a string
    pub fn as_str(&self) -> &str {
        &self.string
    }

    /// Consume the token, returning its string form
    pub fn into_string(self) -> String {
        self.string
    }

    /// SHA-256 fingerprint of the token, safe to log
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw)
    }
}

/// SHA-256 fingerprint of an arbitrary token string, safe to log
pub fn fingerprint_str(token: &str) -> String {
    fingerprint(token.as_bytes())
}

fn fingerprint(bytes: &[u8]) -> String {
    use aws_lc_rs::digest::{digest, SHA256};
    let hash = digest(&SHA256, bytes);
    URL_SAFE_NO_PAD.encode(&hash.as_ref()[..8])
}

impl std::fmt::Debug for PairingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingToken")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl std::fmt::Display for PairingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.string)
    }
}

/// Source of new pairing tokens
pub trait TokenIssuer: Send + Sync {
    /// Issue a fresh, unguessable, URL-safe token
    fn issue(&self) -> PairingToken;
}

/// Issuer backed by the system cryptographic RNG
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTokenIssuer;

impl TokenIssuer for RandomTokenIssuer {
    fn issue(&self) -> PairingToken {
        PairingToken::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_tokens_are_cryptographically_unique() {
        let issuer = RandomTokenIssuer;
        let a = issuer.issue();
        let b = issuer.issue();
        assert_ne!(a.as_str(), b.as_str());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn story_tokens_are_url_safe_and_fixed_length() {
        let token = PairingToken::generate();
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 32 bytes, base64 without padding
        assert_eq!(token.as_str().len(), 43);
    }

    #[test]
    fn story_debug_output_protects_token_secrecy() {
        let token = PairingToken::generate();
        let debug = format!("{:?}", token);
        assert!(!debug.contains(token.as_str()));
        assert!(debug.contains("fingerprint"));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint_str("abc"), fingerprint_str("abc"));
        assert_ne!(fingerprint_str("abc"), fingerprint_str("abd"));
    }
}
