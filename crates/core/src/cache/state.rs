//! In-memory cache arena
//!
//! Items are stored in ordered maps keyed by their composite key, so the
//! serialized snapshot is byte-stable for a given content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokenflow_common::CommonError;
use tokenflow_domain::{
    AccessTokenItem, AccountItem, IdTokenItem, LegacyRefreshTokenItem, RefreshTokenItem, Result,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
    #[serde(rename = "AccessToken", default)]
    pub(crate) access_tokens: BTreeMap<String, AccessTokenItem>,
    #[serde(rename = "RefreshToken", default)]
    pub(crate) refresh_tokens: BTreeMap<String, RefreshTokenItem>,
    #[serde(rename = "IdToken", default)]
    pub(crate) id_tokens: BTreeMap<String, IdTokenItem>,
    #[serde(rename = "Account", default)]
    pub(crate) accounts: BTreeMap<String, AccountItem>,
    #[serde(rename = "LegacyRefreshToken", default)]
    pub(crate) legacy_refresh_tokens: BTreeMap<String, LegacyRefreshTokenItem>,
    #[serde(skip)]
    has_state_changed: bool,
}

impl CacheState {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
            .map_err(|e| CommonError::serialization_format("json", e.to_string()).into())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CommonError::serialization_format("json", e.to_string()).into())
    }

    pub fn has_state_changed(&self) -> bool {
        self.has_state_changed
    }

    pub(crate) fn mark_changed(&mut self) {
        self.has_state_changed = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.has_state_changed = false;
    }

    pub(crate) fn upsert_access_token(&mut self, item: AccessTokenItem) {
        self.access_tokens.insert(item.key(), item);
        self.mark_changed();
    }

    pub(crate) fn upsert_refresh_token(&mut self, item: RefreshTokenItem) {
        self.refresh_tokens.insert(item.key(), item);
        self.mark_changed();
    }

    pub(crate) fn upsert_id_token(&mut self, item: IdTokenItem) {
        self.id_tokens.insert(item.key(), item);
        self.mark_changed();
    }

    pub(crate) fn upsert_account(&mut self, item: AccountItem) {
        self.accounts.insert(item.key(), item);
        self.mark_changed();
    }

    pub(crate) fn upsert_legacy_refresh_token(&mut self, item: LegacyRefreshTokenItem) {
        self.legacy_refresh_tokens.insert(item.key(), item);
        self.mark_changed();
    }

    /// Drop access tokens matching `predicate`; returns how many went.
    pub(crate) fn remove_access_tokens_where(
        &mut self,
        mut predicate: impl FnMut(&AccessTokenItem) -> bool,
    ) -> usize {
        let before = self.access_tokens.len();
        self.access_tokens.retain(|_, item| !predicate(item));
        let removed = before - self.access_tokens.len();
        if removed > 0 {
            self.mark_changed();
        }
        removed
    }

    pub fn access_token_count(&self) -> usize {
        self.access_tokens.len()
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    pub fn id_token_count(&self) -> usize {
        self.id_tokens.len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn legacy_refresh_token_count(&self) -> usize {
        self.legacy_refresh_tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use tokenflow_domain::Secret;

    use super::*;

    fn refresh_token(home: &str) -> RefreshTokenItem {
        RefreshTokenItem {
            environment: "login.microsoftonline.com".into(),
            client_id: "client".into(),
            home_account_id: home.into(),
            secret: Secret::new(format!("rt-{home}")),
            raw_client_info: None,
        }
    }

    #[test]
    fn upsert_replaces_same_key_and_marks_changed() {
        let mut state = CacheState::default();
        assert!(!state.has_state_changed());

        state.upsert_refresh_token(refresh_token("u.t"));
        let mut newer = refresh_token("u.t");
        newer.secret = Secret::new("rotated");
        state.upsert_refresh_token(newer);

        assert_eq!(state.refresh_token_count(), 1);
        assert!(state.has_state_changed());
        state.mark_clean();
        assert!(!state.has_state_changed());
    }

    /// Validates snapshot serialization.
    ///
    /// Assertions:
    /// - Ensures the snapshot uses the named top-level sections.
    /// - Ensures serialize(deserialize(bytes)) reproduces the bytes.
    #[test]
    fn snapshot_sections_and_stability() {
        let mut state = CacheState::default();
        state.upsert_refresh_token(refresh_token("b.t"));
        state.upsert_refresh_token(refresh_token("a.t"));

        let bytes = state.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        for section in ["AccessToken", "RefreshToken", "IdToken", "Account", "LegacyRefreshToken"] {
            assert!(text.contains(&format!("\"{section}\"")), "missing {section}");
        }

        let restored = CacheState::from_bytes(&bytes).unwrap();
        assert_eq!(restored.to_bytes().unwrap(), bytes);
        assert!(!restored.has_state_changed());
    }

    #[test]
    fn empty_bytes_yield_empty_state() {
        let state = CacheState::from_bytes(&[]).unwrap();
        assert_eq!(state, CacheState::default());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = CacheState::from_bytes(b"{not json").unwrap_err();
        assert_eq!(err.code(), "serialization");
    }
}
