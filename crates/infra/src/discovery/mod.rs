//! Authority, instance and home realm discovery over HTTP
//!
//! Every adapter can be pointed at a different origin with `with_origin`,
//! which replaces `https://{host}` in the URLs it builds. Production code
//! leaves it unset.

pub mod authority;
pub mod instance;
pub mod realm;

pub use authority::HttpAuthorityResolver;
pub use instance::HttpInstanceDiscovery;
pub use realm::HttpRealmDiscovery;

/// Host that answers instance discovery for every public cloud.
pub const DEFAULT_TRUSTED_HOST: &str = "login.microsoftonline.com";

/// `https://{host}`, or the override origin without its trailing slash.
fn origin(origin_override: Option<&str>, host: &str) -> String {
    match origin_override {
        Some(origin) => origin.trim_end_matches('/').to_string(),
        None => format!("https://{host}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_prefers_override() {
        assert_eq!(origin(None, "login.windows.net"), "https://login.windows.net");
        assert_eq!(
            origin(Some("http://127.0.0.1:8080/"), "login.windows.net"),
            "http://127.0.0.1:8080"
        );
    }
}
