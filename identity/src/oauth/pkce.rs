//! PKCE (Proof Key for Code Exchange) support, RFC 7636.
//!
//! The verifier travels inside the handshake session; only the S256 challenge
//! appears on the authorization URL.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// The only challenge method this crate emits.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// Generate a new verifier from 32 random bytes (43 base64url characters).
    pub fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Wrap a verifier restored from a stored session.
    pub fn from_string(verifier: String) -> Self {
        Self(verifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Derive the S256 code challenge.
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}
