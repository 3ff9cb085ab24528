//! Domain types and models

pub mod account;
pub mod authority;
pub mod cache_items;
pub mod client_info;
pub mod device_code;
pub mod id_token;
pub mod response;
pub mod result;
pub mod scope;
pub mod secret;

pub use account::Account;
pub use authority::{AuthorityEndpoints, AuthorityInfo, AuthorityType, InstanceMetadata};
pub use cache_items::{
    credential_key, AccessTokenItem, AccountItem, AccountKind, CredentialType, IdTokenItem,
    LegacyRefreshTokenItem, RefreshTokenItem,
};
pub use client_info::ClientInfo;
pub use device_code::{DeviceCodeResponse, DeviceCodeResult};
pub use id_token::{IdToken, IdTokenClaims};
pub use response::{
    AuthorizationResult, AuthorizationStatus, OAuthErrorResponse, SamlAssertion,
    SamlAssertionType, TokenResponse, UserRealm, UserRealmType,
};
pub use result::{AuthenticationResult, TokenSource};
pub use scope::ScopeSet;
pub use secret::Secret;
