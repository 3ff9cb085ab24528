//! Client and user credentials sent with token requests

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokenflow_domain::constants::{
    param, CLIENT_ASSERTION_LIFETIME_SECS, CLIENT_ASSERTION_REFRESH_SKEW_SECS,
    CLIENT_ASSERTION_TYPE_JWT,
};
use tokenflow_domain::{AuthError, Result, Secret};
use tracing::debug;
use uuid::Uuid;

/// How a confidential client proves its identity.
pub enum ClientCredential {
    Secret(Secret),
    Certificate(CertificateCredential),
    /// A pre-signed assertion supplied by the application.
    SignedAssertion(Secret),
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(_) => f.write_str("ClientCredential::Secret(..)"),
            Self::Certificate(cert) => f.debug_tuple("ClientCredential::Certificate").field(cert).finish(),
            Self::SignedAssertion(_) => f.write_str("ClientCredential::SignedAssertion(..)"),
        }
    }
}

impl ClientCredential {
    pub fn secret(secret: impl Into<String>) -> Self {
        Self::Secret(Secret::new(secret))
    }

    /// Body parameters that authenticate the client at the token endpoint.
    ///
    /// `audience` is the authority's self-signed JWT audience; it only
    /// matters for certificate credentials.
    pub fn authentication_parameters(
        &self,
        client_id: &str,
        audience: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>> {
        match self {
            Self::Secret(secret) => Ok(vec![(param::CLIENT_SECRET, secret.expose().to_string())]),
            Self::Certificate(cert) => {
                let assertion = cert.assertion(client_id, audience, now)?;
                Ok(vec![
                    (param::CLIENT_ASSERTION_TYPE, CLIENT_ASSERTION_TYPE_JWT.to_string()),
                    (param::CLIENT_ASSERTION, assertion.expose().to_string()),
                ])
            }
            Self::SignedAssertion(assertion) => Ok(vec![
                (param::CLIENT_ASSERTION_TYPE, CLIENT_ASSERTION_TYPE_JWT.to_string()),
                (param::CLIENT_ASSERTION, assertion.expose().to_string()),
            ]),
        }
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: i64,
    exp: i64,
}

struct CachedAssertion {
    audience: String,
    expires_at: DateTime<Utc>,
    jwt: Secret,
}

/// Certificate credential that signs RS256 client assertions.
///
/// The last signed assertion is kept and reused until it is about to expire
/// or a different audience is requested.
pub struct CertificateCredential {
    key: EncodingKey,
    /// base64url SHA-1 thumbprint of the certificate (`x5t`)
    x5t: String,
    cached: Mutex<Option<CachedAssertion>>,
}

impl fmt::Debug for CertificateCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateCredential").field("x5t", &self.x5t).finish_non_exhaustive()
    }
}

impl CertificateCredential {
    /// Build from a PEM RSA private key and the certificate's hex SHA-1
    /// thumbprint.
    ///
    /// # Errors
    /// `InvalidClientCredential` for an unreadable key or thumbprint.
    pub fn from_rsa_pem(private_key_pem: &[u8], thumbprint_hex: &str) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| AuthError::InvalidClientCredential(format!("private key: {e}")))?;
        let thumbprint = hex::decode(thumbprint_hex.trim())
            .map_err(|e| AuthError::InvalidClientCredential(format!("thumbprint: {e}")))?;
        Ok(Self { key, x5t: URL_SAFE_NO_PAD.encode(thumbprint), cached: Mutex::new(None) })
    }

    pub fn x5t(&self) -> &str {
        &self.x5t
    }

    fn assertion(&self, client_id: &str, audience: &str, now: DateTime<Utc>) -> Result<Secret> {
        let mut cached = self.cached.lock();
        if let Some(existing) = cached.as_ref() {
            let fresh = existing.expires_at - now > Duration::seconds(CLIENT_ASSERTION_REFRESH_SKEW_SECS);
            if fresh && existing.audience == audience {
                return Ok(existing.jwt.clone());
            }
        }

        let expires_at = now + Duration::seconds(CLIENT_ASSERTION_LIFETIME_SECS);
        let claims = AssertionClaims {
            aud: audience,
            iss: client_id,
            sub: client_id,
            jti: Uuid::new_v4().to_string(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.x5t = Some(self.x5t.clone());

        let jwt = jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| AuthError::InvalidClientCredential(format!("signing failed: {e}")))?;
        debug!(audience, "signed new client assertion");

        let jwt = Secret::new(jwt);
        *cached = Some(CachedAssertion { audience: audience.to_string(), expires_at, jwt: jwt.clone() });
        Ok(jwt)
    }
}

/// Incoming access token traded in an on-behalf-of request.
#[derive(Clone)]
pub struct UserAssertion {
    assertion: Secret,
    assertion_type: String,
    hash: String,
}

impl fmt::Debug for UserAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAssertion")
            .field("assertion_type", &self.assertion_type)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

impl UserAssertion {
    /// JWT bearer assertion.
    pub fn new(assertion: impl Into<String>) -> Self {
        Self::with_type(assertion, tokenflow_domain::constants::grant_type::JWT_BEARER)
    }

    pub fn with_type(assertion: impl Into<String>, assertion_type: impl Into<String>) -> Self {
        let assertion = assertion.into();
        let hash = STANDARD.encode(Sha256::digest(assertion.as_bytes()));
        Self { assertion: Secret::new(assertion), assertion_type: assertion_type.into(), hash }
    }

    pub fn assertion(&self) -> &Secret {
        &self.assertion
    }

    pub fn assertion_type(&self) -> &str {
        &self.assertion_type
    }

    /// base64 SHA-256 of the assertion; partitions the cache.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::testing::{TEST_CERT_THUMBPRINT, TEST_RSA_PRIVATE_KEY};

    fn decode_payload(jwt: &str) -> serde_json::Value {
        let payload = jwt.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    fn decode_header(jwt: &str) -> serde_json::Value {
        let header = jwt.split('.').next().unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap()
    }

    #[test]
    fn secret_credential_sends_client_secret() {
        let credential = ClientCredential::secret("s3cret");
        let params = credential.authentication_parameters("cid", "aud", Utc::now()).unwrap();
        assert_eq!(params, vec![("client_secret", "s3cret".to_string())]);
        assert!(!format!("{credential:?}").contains("s3cret"));
    }

    /// Validates client assertion contents and reuse.
    ///
    /// Assertions:
    /// - Ensures claims carry audience, issuer, subject and a 10 minute life.
    /// - Ensures the header carries RS256 and x5t.
    /// - Ensures a second call inside the window reuses the same JWT.
    /// - Ensures a call within 60 seconds of expiry signs a new JWT.
    /// - Ensures a different audience signs a new JWT.
    #[test]
    fn certificate_assertion_is_cached_until_near_expiry() {
        let cert =
            CertificateCredential::from_rsa_pem(TEST_RSA_PRIVATE_KEY.as_bytes(), TEST_CERT_THUMBPRINT)
                .unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let first = cert.assertion("cid", "https://login/tenant/oauth2/v2.0/token", start).unwrap();
        let claims = decode_payload(first.expose());
        assert_eq!(claims["aud"], "https://login/tenant/oauth2/v2.0/token");
        assert_eq!(claims["iss"], "cid");
        assert_eq!(claims["sub"], "cid");
        assert_eq!(claims["exp"].as_i64().unwrap() - claims["nbf"].as_i64().unwrap(), 600);
        let header = decode_header(first.expose());
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["x5t"], cert.x5t());

        let reused = cert
            .assertion("cid", "https://login/tenant/oauth2/v2.0/token", start + Duration::minutes(5))
            .unwrap();
        assert_eq!(reused, first);

        let near_expiry = cert
            .assertion("cid", "https://login/tenant/oauth2/v2.0/token", start + Duration::seconds(550))
            .unwrap();
        assert_ne!(near_expiry, first);

        let other_audience = cert
            .assertion("cid", "https://other/token", start + Duration::seconds(560))
            .unwrap();
        assert_ne!(other_audience, near_expiry);
    }

    #[test]
    fn rejects_bad_key_material() {
        assert!(matches!(
            CertificateCredential::from_rsa_pem(b"not a key", TEST_CERT_THUMBPRINT),
            Err(AuthError::InvalidClientCredential(_))
        ));
        assert!(matches!(
            CertificateCredential::from_rsa_pem(TEST_RSA_PRIVATE_KEY.as_bytes(), "zz"),
            Err(AuthError::InvalidClientCredential(_))
        ));
    }

    #[test]
    fn user_assertion_hash_is_base64_sha256() {
        let assertion = UserAssertion::new("abc");
        assert_eq!(assertion.hash(), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
        assert_eq!(assertion.assertion_type(), "urn:ietf:params:oauth:grant-type:jwt-bearer");
        assert!(!format!("{assertion:?}").contains("\"abc\""));
    }
}
