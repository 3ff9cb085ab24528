//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for public clients that cannot hold a secret. The
//! interactive flow sends the challenge on the authorize request and the
//! verifier on the token request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

const RANDOM_BYTES: usize = 32;

fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generate a cryptographically secure code verifier
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43 characters).
/// Per RFC 7636, verifiers must be 43-128 characters long.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_urlsafe(RANDOM_BYTES)
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state token for CSRF protection
#[must_use]
pub fn generate_state() -> String {
    random_urlsafe(RANDOM_BYTES)
}

/// Generate a random nonce bound into the ID token
#[must_use]
pub fn generate_nonce() -> String {
    random_urlsafe(RANDOM_BYTES)
}

/// Validate that the state returned by the authorization server matches
///
/// Some identity providers normalise the case of the echoed value, so the
/// comparison is ASCII case-insensitive.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

/// PKCE challenge pair plus the anti-forgery values sent with it
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string (43-128 chars, base64url encoded)
    /// Kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of code_verifier (base64url encoded)
    pub code_challenge: String,

    /// Random CSRF protection token
    pub state: String,

    /// Random value the ID token must echo back
    pub nonce: String,
}

impl PkceChallenge {
    /// Generate a new challenge with fresh random values
    ///
    /// # Examples
    /// ```
    /// use tokenflow_common::auth::pkce::PkceChallenge;
    ///
    /// let challenge = PkceChallenge::generate();
    /// assert!(challenge.code_verifier.len() >= 43);
    /// assert!(challenge.code_verifier.len() <= 128);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        Self { code_verifier, code_challenge, state: generate_state(), nonce: generate_nonce() }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}
