//! Proof Key for Code Exchange (RFC 7636) and the redirect `state` token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Per-login secrets: the `state` echoed by the redirect and the PKCE
/// verifier sent with the code exchange.
#[derive(Debug, Clone)]
pub struct LoginChallenge {
    state: String,
    verifier: String,
}

impl LoginChallenge {
    /// Draws a fresh state and a 43-character verifier.
    pub fn new() -> Self {
        Self {
            state: random_token::<16>(),
            verifier: random_token::<32>(),
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// `BASE64URL(SHA256(verifier))`, sent as `code_challenge`.
    pub fn challenge(&self) -> String {
        challenge_for(&self.verifier)
    }

    /// Always `S256`.
    pub fn method(&self) -> &'static str {
        "S256"
    }
}

impl Default for LoginChallenge {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
