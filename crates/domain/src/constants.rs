//! Protocol constants
//!
//! Centralized location for OAuth2/OIDC parameter names, grant types and the
//! timing constants the cache and credential code depend on.

/// Scopes added to every user-flow request and never accepted from callers.
pub const RESERVED_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Tenant aliases that do not identify a single directory.
pub const TENANTLESS_TENANTS: [&str; 3] = ["common", "organizations", "consumers"];

/// Directory that hosts personal (consumer) accounts.
pub const MSA_TENANT_ID: &str = "9188040d-6c67-4c5b-b112-36a304b66dad";

/// Access tokens expiring within this window are treated as expired.
pub const DEFAULT_EXPIRATION_BUFFER_SECS: i64 = 300;

/// Lifetime of a self-signed client assertion.
pub const CLIENT_ASSERTION_LIFETIME_SECS: i64 = 600;

/// A cached client assertion is regenerated once it is this close to expiry.
pub const CLIENT_ASSERTION_REFRESH_SKEW_SECS: i64 = 60;

pub const CLIENT_ASSERTION_TYPE_JWT: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// `grant_type` values
pub mod grant_type {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const PASSWORD: &str = "password";
    pub const JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
    pub const SAML11_BEARER: &str = "urn:ietf:params:oauth:grant-type:saml1_1-bearer";
    pub const SAML20_BEARER: &str = "urn:ietf:params:oauth:grant-type:saml2-bearer";
    pub const DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";
}

/// Form and query parameter names
pub mod param {
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_INFO: &str = "client_info";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const CLIENT_ASSERTION: &str = "client_assertion";
    pub const CLIENT_ASSERTION_TYPE: &str = "client_assertion_type";
    pub const GRANT_TYPE: &str = "grant_type";
    pub const SCOPE: &str = "scope";
    pub const CODE: &str = "code";
    pub const CODE_VERIFIER: &str = "code_verifier";
    pub const CODE_CHALLENGE: &str = "code_challenge";
    pub const CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
    pub const REDIRECT_URI: &str = "redirect_uri";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const RESPONSE_TYPE: &str = "response_type";
    pub const STATE: &str = "state";
    pub const NONCE: &str = "nonce";
    pub const LOGIN_HINT: &str = "login_hint";
    pub const PROMPT: &str = "prompt";
    pub const ASSERTION: &str = "assertion";
    pub const REQUESTED_TOKEN_USE: &str = "requested_token_use";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const ERROR: &str = "error";
    pub const ERROR_DESCRIPTION: &str = "error_description";
    pub const DEVICE_CODE: &str = "device_code";
}

/// OAuth error codes the engine reacts to
pub mod oauth_error {
    pub const INVALID_GRANT: &str = "invalid_grant";
    pub const INTERACTION_REQUIRED: &str = "interaction_required";
    pub const CONSENT_REQUIRED: &str = "consent_required";
    pub const LOGIN_REQUIRED: &str = "login_required";
    pub const ACCESS_DENIED: &str = "access_denied";
    /// Device code polling: the user has not finished signing in yet.
    pub const AUTHORIZATION_PENDING: &str = "authorization_pending";
    /// Device code polling: poll less often.
    pub const SLOW_DOWN: &str = "slow_down";
    pub const EXPIRED_TOKEN: &str = "expired_token";
    /// Raised locally when a device code lapses while polling.
    pub const CODE_EXPIRED: &str = "code_expired";

    /// Codes that mean only a user interaction can recover the session.
    pub const INTERACTION_CODES: [&str; 4] =
        [INVALID_GRANT, INTERACTION_REQUIRED, CONSENT_REQUIRED, LOGIN_REQUIRED];
}
