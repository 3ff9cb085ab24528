//! Authorization request primitives
//!
//! PKCE verifier/challenge pairs, `state` and `nonce` generation, and the
//! comparison rules applied when an authorization response comes back.

pub mod pkce;

pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_nonce, generate_state,
    validate_state, PkceChallenge,
};
