//! Unverified ID token decoding
//!
//! The token arrives over TLS straight from the token endpoint, so only the
//! payload is decoded; signature validation is the resource's concern.

use serde::{Deserialize, Serialize};

use super::client_info::decode_base64url;
use crate::errors::{AuthError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub upn: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdToken {
    pub raw: String,
    pub claims: IdTokenClaims,
}

impl IdToken {
    /// # Errors
    /// `InvalidIdToken` when the value is not a three-part JWT with a JSON
    /// payload.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(AuthError::InvalidIdToken("expected three segments".to_string())),
        };

        let bytes = decode_base64url(payload).map_err(AuthError::InvalidIdToken)?;
        let claims = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

        Ok(Self { raw: raw.to_string(), claims })
    }

    /// Object id, falling back to `sub` (ADFS and B2C tokens may omit `oid`).
    pub fn object_id(&self) -> Option<&str> {
        self.claims.oid.as_deref().or(self.claims.sub.as_deref())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.claims.tid.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.claims
            .preferred_username
            .as_deref()
            .or(self.claims.upn.as_deref())
            .or(self.claims.email.as_deref())
    }
}
