//! Error types used throughout the token acquisition engine

use std::time::Duration;

use thiserror::Error;
use tokenflow_common::error::{CommonError, ErrorClassification, ErrorSeverity};

use crate::constants::oauth_error;

/// Coarse grouping of [`AuthError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied invalid input; nothing was sent.
    Client,
    /// The interactive step ended without an authorization code.
    Ui,
    /// The identity provider answered with something that violates the protocol.
    Protocol,
    /// The identity provider returned an OAuth error.
    Service,
    Cache,
    Authority,
    Cancelled,
    Transport,
    Internal,
}

/// Main error type for token acquisition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    // Client errors
    #[error("at least one scope is required")]
    EmptyScopes,

    #[error("scope '{0}' is reserved and is added automatically")]
    ReservedScope(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("invalid authority '{authority}': {reason}")]
    InvalidAuthority { authority: String, reason: String },

    #[error("redirect uri must not contain a fragment: {0}")]
    RedirectUriHasFragment(String),

    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid client credential: {0}")]
    InvalidClientCredential(String),

    // UI errors
    #[error("the user canceled authentication")]
    UserCanceled,

    #[error("access denied: {description}")]
    AccessDenied { description: String },

    #[error("authentication UI failed ({code}): {description}")]
    AuthenticationUiFailed { code: String, description: String },

    // Protocol errors
    #[error("returned state does not match the state sent on the authorization request")]
    StateMismatch,

    #[error("returned user '{returned}' does not match the requested account '{expected}'")]
    UserMismatch { expected: String, returned: String },

    #[error("id token nonce does not match the authorization request")]
    NonceMismatch,

    #[error("invalid client_info: {0}")]
    InvalidClientInfo(String),

    #[error("invalid id_token: {0}")]
    InvalidIdToken(String),

    #[error("user realm discovery returned an unknown account type for '{0}'")]
    UnknownUserType(String),

    #[error("WS-Trust exchange failed: {0}")]
    WsTrustFailed(String),

    #[error("metadata exchange discovery failed: {0}")]
    MexDiscoveryFailed(String),

    // Service errors
    #[error("identity provider returned '{code}': {description}")]
    Service {
        code: String,
        description: String,
        status: Option<u16>,
        suberror: Option<String>,
        correlation_id: Option<String>,
    },

    #[error("user interaction required ({code}): {description}")]
    InteractionRequired { code: String, description: String },

    // Cache errors
    #[error("multiple tokens in the cache match the request; pass an account to disambiguate")]
    MultipleTokensMatched,

    #[error("no refresh token for the account was found in the cache")]
    NoTokensFound,

    // Authority errors
    #[error("authority '{0}' is not a trusted instance")]
    UntrustedAuthority(String),

    #[error("tenant discovery failed: {0}")]
    TenantDiscoveryFailed(String),

    #[error("operation '{operation}' was cancelled")]
    Cancelled { operation: String },

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result type alias for token acquisition operations
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Build a service error from an OAuth error payload.
    pub fn service(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            description: description.into(),
            status: None,
            suberror: None,
            correlation_id: None,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled { operation: operation.into() }
    }

    pub fn invalid_authority(authority: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAuthority { authority: authority.into(), reason: reason.into() }
    }

    /// Stable snake_case code, suitable for telemetry and matching.
    pub fn code(&self) -> &str {
        match self {
            Self::EmptyScopes => "empty_scopes",
            Self::ReservedScope(_) => "reserved_scope",
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidAuthority { .. } => "invalid_authority",
            Self::RedirectUriHasFragment(_) => "redirect_uri_has_fragment",
            Self::MissingArgument(_) => "missing_argument",
            Self::InvalidClientCredential(_) => "invalid_client_credential",
            Self::UserCanceled => "authentication_canceled",
            Self::AccessDenied { .. } => "access_denied",
            Self::AuthenticationUiFailed { .. } => "authentication_ui_failed",
            Self::StateMismatch => "state_mismatch",
            Self::UserMismatch { .. } => "user_mismatch",
            Self::NonceMismatch => "nonce_mismatch",
            Self::InvalidClientInfo(_) => "invalid_client_info",
            Self::InvalidIdToken(_) => "invalid_id_token",
            Self::UnknownUserType(_) => "unknown_user_type",
            Self::WsTrustFailed(_) => "wstrust_failed",
            Self::MexDiscoveryFailed(_) => "mex_discovery_failed",
            Self::Service { code, .. } => code.as_str(),
            Self::InteractionRequired { .. } => "interaction_required",
            Self::MultipleTokensMatched => "multiple_tokens_matched",
            Self::NoTokensFound => "no_tokens_found",
            Self::UntrustedAuthority(_) => "untrusted_authority",
            Self::TenantDiscoveryFailed(_) => "tenant_discovery_failed",
            Self::Cancelled { .. } => "cancelled",
            Self::Network(_) => "network_error",
            Self::Common(err) => err.error_type_name(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyScopes
            | Self::ReservedScope(_)
            | Self::InvalidScope(_)
            | Self::InvalidAuthority { .. }
            | Self::RedirectUriHasFragment(_)
            | Self::MissingArgument(_)
            | Self::InvalidClientCredential(_) => ErrorCategory::Client,
            Self::UserCanceled | Self::AccessDenied { .. } | Self::AuthenticationUiFailed { .. } => {
                ErrorCategory::Ui
            }
            Self::StateMismatch
            | Self::UserMismatch { .. }
            | Self::NonceMismatch
            | Self::InvalidClientInfo(_)
            | Self::InvalidIdToken(_)
            | Self::UnknownUserType(_)
            | Self::WsTrustFailed(_)
            | Self::MexDiscoveryFailed(_) => ErrorCategory::Protocol,
            Self::Service { .. } | Self::InteractionRequired { .. } => ErrorCategory::Service,
            Self::MultipleTokensMatched | Self::NoTokensFound => ErrorCategory::Cache,
            Self::UntrustedAuthority(_) | Self::TenantDiscoveryFailed(_) => {
                ErrorCategory::Authority
            }
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Network(_) => ErrorCategory::Transport,
            Self::Common(_) => ErrorCategory::Internal,
        }
    }

    /// True when only an interactive request can recover.
    pub fn is_interaction_required(&self) -> bool {
        matches!(self, Self::InteractionRequired { .. } | Self::NoTokensFound)
    }

    /// Rewrite a service error whose code means the session is gone.
    ///
    /// Used by flows that redeem a cached grant: `invalid_grant` there means
    /// the refresh token is dead and the caller must go interactive.
    #[must_use]
    pub fn into_interaction_required(self) -> Self {
        match self {
            Self::Service { code, description, .. }
                if oauth_error::INTERACTION_CODES.contains(&code.as_str()) =>
            {
                Self::InteractionRequired { code, description }
            }
            other => other,
        }
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Service { status: Some(status), .. } => *status >= 500,
            Self::Common(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Cancelled => ErrorSeverity::Info,
            ErrorCategory::Ui | ErrorCategory::Cache => ErrorSeverity::Info,
            ErrorCategory::Transport => ErrorSeverity::Warning,
            ErrorCategory::Service if self.is_interaction_required() => ErrorSeverity::Info,
            ErrorCategory::Internal => match self {
                Self::Common(e) => e.severity(),
                _ => ErrorSeverity::Error,
            },
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Common(e) => e.is_critical(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Common(e) => e.retry_after(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grant_maps_to_interaction_required() {
        let err = AuthError::service("invalid_grant", "AADSTS70000: refresh token expired")
            .into_interaction_required();
        assert!(err.is_interaction_required());
        assert_eq!(err.code(), "interaction_required");
        assert_eq!(err.category(), ErrorCategory::Service);
    }

    #[test]
    fn other_service_errors_are_untouched() {
        let err = AuthError::service("invalid_client", "bad secret").into_interaction_required();
        assert_eq!(err.code(), "invalid_client");
        assert!(!err.is_interaction_required());
    }

    /// Validates the category mapping for representative variants.
    ///
    /// Assertions:
    /// - Confirms UI, protocol, cache and authority variants land in their
    ///   own categories.
    #[test]
    fn categories_cover_taxonomy() {
        assert_eq!(AuthError::UserCanceled.category(), ErrorCategory::Ui);
        assert_eq!(AuthError::StateMismatch.category(), ErrorCategory::Protocol);
        assert_eq!(AuthError::MultipleTokensMatched.category(), ErrorCategory::Cache);
        assert_eq!(
            AuthError::UntrustedAuthority("https://evil".into()).category(),
            ErrorCategory::Authority
        );
        assert_eq!(
            AuthError::TenantDiscoveryFailed("404".into()).category(),
            ErrorCategory::Authority
        );
        assert_eq!(AuthError::cancelled("token_exchange").category(), ErrorCategory::Cancelled);
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = AuthError::Service {
            code: "temporarily_unavailable".into(),
            description: String::new(),
            status: Some(503),
            suberror: None,
            correlation_id: None,
        };
        assert!(err.is_retryable());
        assert!(!AuthError::service("invalid_scope", "").is_retryable());
        assert!(AuthError::Network("reset".into()).is_retryable());
    }

    #[test]
    fn common_errors_delegate_classification() {
        let err: AuthError = CommonError::internal("broken invariant").into();
        assert!(err.is_critical());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.code(), "internal");
    }
}
