//! Case-insensitive scope sets
//!
//! Scopes are compared case-insensitively everywhere (requests, cache
//! matching, server responses), so they are lower-cased on entry and stored
//! once. Insertion order is kept for display; the canonical string used on
//! the wire and in cache keys is sorted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::RESERVED_SCOPES;
use crate::errors::{AuthError, Result};

#[derive(Debug, Clone, Default)]
pub struct ScopeSet {
    scopes: Vec<String>,
}

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient parse of a space-delimited scope string.
    ///
    /// Used for server responses and cached items; no request policy is
    /// applied.
    pub fn from_scope_string(value: &str) -> Self {
        let mut set = Self::new();
        for scope in value.split_whitespace() {
            set.insert(scope);
        }
        set
    }

    /// Lenient construction from individual entries, each of which may itself
    /// be space-delimited.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for entry in entries {
            for scope in entry.as_ref().split_whitespace() {
                set.insert(scope);
            }
        }
        set
    }

    /// Build the requested scope set for a token request.
    ///
    /// # Errors
    /// See [`ScopeSet::validate_for_request`].
    pub fn normalize<I, S>(entries: I, client_id: &str, is_client_credential: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::from_entries(entries);
        set.validate_for_request(client_id, is_client_credential)?;
        Ok(set)
    }

    /// Reject scope sets a caller may not send.
    ///
    /// # Errors
    /// - `EmptyScopes` when nothing was requested
    /// - `ReservedScope` for `openid`, `profile` or `offline_access`
    /// - `InvalidScope` when the client id is mixed with other scopes, or is
    ///   used outside a client-credential request
    pub fn validate_for_request(&self, client_id: &str, is_client_credential: bool) -> Result<()> {
        if self.is_empty() {
            return Err(AuthError::EmptyScopes);
        }

        if let Some(reserved) = self.scopes.iter().find(|s| is_reserved(s)) {
            return Err(AuthError::ReservedScope(reserved.clone()));
        }

        if !client_id.is_empty() && self.contains(client_id) {
            let sole = self.len() == 1;
            if !(sole && is_client_credential) {
                return Err(AuthError::InvalidScope(format!(
                    "client id '{client_id}' can only be the sole scope of a client credential \
                     request"
                )));
            }
        }

        Ok(())
    }

    /// Insert a scope; returns `false` if it was already present.
    pub fn insert(&mut self, scope: &str) -> bool {
        let scope = scope.trim().to_lowercase();
        if scope.is_empty() || self.scopes.contains(&scope) {
            return false;
        }
        self.scopes.push(scope);
        true
    }

    pub fn remove(&mut self, scope: &str) -> bool {
        let scope = scope.to_lowercase();
        let before = self.scopes.len();
        self.scopes.retain(|s| *s != scope);
        before != self.scopes.len()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s.eq_ignore_ascii_case(scope))
    }

    /// Superset test: every scope of `other` is present here.
    pub fn contains_all(&self, other: &Self) -> bool {
        other.scopes.iter().all(|s| self.scopes.contains(s))
    }

    pub fn intersects(&self, other: &Self) -> bool {
        other.scopes.iter().any(|s| self.scopes.contains(s))
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for scope in &other.scopes {
            merged.insert(scope);
        }
        merged
    }

    /// Scopes actually sent to the token endpoint.
    ///
    /// User flows always ask for the reserved scopes so an ID token and a
    /// refresh token come back; the client id is dropped because the ID
    /// token already represents the application itself. Client-credential
    /// requests are sent as-is.
    #[must_use]
    pub fn decorate(&self, client_id: &str, is_client_credential: bool) -> Self {
        if is_client_credential {
            return self.clone();
        }

        let mut decorated = self.clone();
        if !client_id.is_empty() {
            decorated.remove(client_id);
        }
        for reserved in RESERVED_SCOPES {
            decorated.insert(reserved);
        }
        decorated
    }

    /// Copy without `openid`, `profile` and `offline_access`.
    #[must_use]
    pub fn without_reserved(&self) -> Self {
        Self { scopes: self.scopes.iter().filter(|s| !is_reserved(s)).cloned().collect() }
    }

    /// Canonical form: lexicographically sorted and space-joined.
    pub fn as_single_string(&self) -> String {
        let mut sorted = self.scopes.clone();
        sorted.sort();
        sorted.join(" ")
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }
}

fn is_reserved(scope: &str) -> bool {
    RESERVED_SCOPES.iter().any(|r| r.eq_ignore_ascii_case(scope))
}

impl PartialEq for ScopeSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.contains_all(other)
    }
}

impl Eq for ScopeSet {}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scopes.join(" "))
    }
}

impl<S: AsRef<str>> FromIterator<S> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::from_entries(iter)
    }
}

impl Serialize for ScopeSet {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> std::result::Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(&self.as_single_string())
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_scope_string(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "b6c69a37-df96-4db0-9088-2ab96e1d8215";

    #[test]
    fn normalize_lowercases_and_deduplicates() {
        let set = ScopeSet::normalize(["User.Read", "user.read MAIL.send"], CLIENT_ID, false)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("USER.READ"));
        assert_eq!(set.to_string(), "user.read mail.send");
    }

    /// Validates that reserved scopes are rejected at request entry.
    ///
    /// Assertions:
    /// - Ensures each reserved scope yields `ReservedScope` in any casing.
    #[test]
    fn normalize_rejects_reserved_scopes() {
        for reserved in ["openid", "Profile", "OFFLINE_ACCESS"] {
            let err = ScopeSet::normalize(["user.read", reserved], CLIENT_ID, false).unwrap_err();
            assert!(matches!(err, AuthError::ReservedScope(_)), "{reserved}: {err:?}");
        }
    }

    #[test]
    fn normalize_rejects_empty() {
        let err = ScopeSet::normalize(Vec::<String>::new(), CLIENT_ID, false).unwrap_err();
        assert_eq!(err, AuthError::EmptyScopes);
        let err = ScopeSet::normalize(["   "], CLIENT_ID, false).unwrap_err();
        assert_eq!(err, AuthError::EmptyScopes);
    }

    /// Validates client-id-as-scope handling.
    ///
    /// Assertions:
    /// - Ensures the client id alone is accepted for client credentials.
    /// - Ensures it is rejected when mixed with other scopes.
    /// - Ensures it is rejected for user flows.
    #[test]
    fn client_id_scope_rules() {
        assert!(ScopeSet::normalize([CLIENT_ID], CLIENT_ID, true).is_ok());
        assert!(matches!(
            ScopeSet::normalize([CLIENT_ID, "user.read"], CLIENT_ID, true),
            Err(AuthError::InvalidScope(_))
        ));
        assert!(matches!(
            ScopeSet::normalize([CLIENT_ID], CLIENT_ID, false),
            Err(AuthError::InvalidScope(_))
        ));
    }

    #[test]
    fn decorate_is_idempotent() {
        let set = ScopeSet::from_entries(["user.read", CLIENT_ID]);
        let once = set.decorate(CLIENT_ID, false);
        let twice = once.decorate(CLIENT_ID, false);
        assert_eq!(once, twice);
        assert!(once.contains("openid"));
        assert!(once.contains("offline_access"));
        assert!(!once.contains(CLIENT_ID));
    }

    #[test]
    fn decorate_client_credential_is_identity() {
        let set = ScopeSet::from_entries(["https://graph.microsoft.com/.default"]);
        assert_eq!(set.decorate(CLIENT_ID, true), set);
    }

    #[test]
    fn single_string_is_sorted() {
        let set = ScopeSet::from_entries(["b", "c", "a"]);
        assert_eq!(set.as_single_string(), "a b c");
        assert_eq!(set.to_string(), "b c a");
    }

    #[test]
    fn superset_and_intersection() {
        let cached = ScopeSet::from_scope_string("user.read mail.read");
        assert!(cached.contains_all(&ScopeSet::from_scope_string("USER.READ")));
        assert!(!cached.contains_all(&ScopeSet::from_scope_string("user.read files.read")));
        assert!(cached.intersects(&ScopeSet::from_scope_string("user.read files.read")));
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(ScopeSet::from_scope_string("a b"), ScopeSet::from_scope_string("B A"));
        assert_ne!(ScopeSet::from_scope_string("a b"), ScopeSet::from_scope_string("a"));
    }

    #[test]
    fn serde_uses_canonical_string() {
        let set = ScopeSet::from_scope_string("z a");
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "\"a z\"");
        let back: ScopeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn without_reserved_strips_decoration() {
        let decorated = ScopeSet::from_scope_string("user.read").decorate(CLIENT_ID, false);
        assert_eq!(decorated.without_reserved(), ScopeSet::from_scope_string("user.read"));
    }
}
