//! Token cache engine
//!
//! The cache owns every access token, refresh token, ID token and account
//! record written for one client. All reads and writes go through
//! [`TokenCache::access`], which holds the state lock for the whole
//! persistence round trip: `before_access` may load a snapshot, the unit of
//! work runs synchronously, and `after_access` fires exactly once whatever
//! the outcome.

mod aliases;
mod legacy;
mod query;
mod state;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokenflow_common::{Clock, SystemClock};
use tokenflow_domain::{
    credential_key, AccessTokenItem, Account, AccountItem, AccountKind, AuthError, AuthorityInfo,
    AuthorityType, CacheOptions, CredentialType, IdTokenItem, InstanceMetadata, RefreshTokenItem,
    Result,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub use aliases::{is_known_host, known_metadata, StaticInstanceDiscovery};
pub use query::{CacheLookup, SavedTokens, TokenQuery, TokenWrite};
pub use state::CacheState;

use crate::ports::{CacheNotificationArgs, CachePersistence, InstanceDiscovery};

/// Item counts per section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub access_tokens: usize,
    pub refresh_tokens: usize,
    pub id_tokens: usize,
    pub accounts: usize,
    pub legacy_refresh_tokens: usize,
}

pub struct TokenCache {
    client_id: String,
    options: CacheOptions,
    state: Mutex<CacheState>,
    persistence: Option<Arc<dyn CachePersistence>>,
    instance_discovery: Arc<dyn InstanceDiscovery>,
    metadata: DashMap<String, InstanceMetadata>,
    flights: DashMap<String, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("client_id", &self.client_id)
            .field("options", &self.options)
            .field("has_persistence", &self.persistence.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            options: CacheOptions::default(),
            state: Mutex::new(CacheState::default()),
            persistence: None,
            instance_discovery: Arc::new(StaticInstanceDiscovery),
            metadata: DashMap::new(),
            flights: DashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn CachePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    #[must_use]
    pub fn with_instance_discovery(mut self, discovery: Arc<dyn InstanceDiscovery>) -> Self {
        self.instance_discovery = discovery;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    fn expiration_buffer(&self) -> Duration {
        Duration::seconds(self.options.expiration_buffer_seconds)
    }

    /// Alias group for the authority host, cached per host.
    pub async fn instance_metadata(&self, authority: &AuthorityInfo) -> Result<InstanceMetadata> {
        if let Some(cached) = self.metadata.get(authority.host()) {
            return Ok(cached.clone());
        }

        let metadata = self.instance_discovery.metadata(authority).await?;
        for alias in metadata.aliases.iter().chain([&metadata.preferred_cache]) {
            self.metadata.insert(alias.to_lowercase(), metadata.clone());
        }
        self.metadata.insert(authority.host().to_string(), metadata.clone());
        Ok(metadata)
    }

    async fn environment_metadata(&self, environment: &str) -> Result<InstanceMetadata> {
        match AuthorityInfo::parse(&format!("https://{environment}/common/")) {
            Ok(authority) => self.instance_metadata(&authority).await,
            Err(_) => Ok(InstanceMetadata::self_aliased(environment)),
        }
    }

    /// Run one logical cache access.
    ///
    /// The state lock is held from `before_access` to `after_access`, and
    /// `after_access` runs on every path once `before_access` was called.
    pub(crate) async fn access<T, F>(&self, mut args: CacheNotificationArgs, unit: F) -> Result<T>
    where
        F: FnOnce(&mut CacheState) -> Result<T> + Send,
        T: Send,
    {
        let mut state = self.state.lock().await;

        let Some(persistence) = self.persistence.as_ref() else {
            return unit(&mut state);
        };

        let loaded = match persistence.before_access(&args).await {
            Ok(Some(snapshot)) => CacheState::from_bytes(&snapshot).map(|fresh| *state = fresh),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        let outcome = loaded.and_then(|()| unit(&mut state));

        args.has_state_changed = state.has_state_changed();
        let snapshot = if args.has_state_changed {
            match state.to_bytes() {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "failed to snapshot token cache for persistence");
                    None
                }
            }
        } else {
            None
        };

        let notified = persistence.after_access(&args, snapshot).await;
        if notified.is_ok() && args.has_state_changed {
            state.mark_clean();
        }

        match (outcome, notified) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => {
                warn!(error = %e, is_write = args.is_write, "after_access hook failed");
                Err(e)
            }
            (Err(e), Err(hook)) => {
                warn!(error = %hook, "after_access hook failed after an error");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    fn notification(&self, home_account_id: Option<&str>, is_write: bool) -> CacheNotificationArgs {
        CacheNotificationArgs {
            client_id: self.client_id.clone(),
            home_account_id: home_account_id.map(str::to_string),
            is_write,
            has_state_changed: false,
        }
    }

    /// Serialise find, refresh and save sequences for one token.
    ///
    /// Callers hold the returned guard across the whole sequence; requests
    /// for other keys are not blocked. The key is forgotten once the last
    /// holder or waiter is gone.
    pub async fn lock_flight(&self, key: &str) -> FlightGuard<'_> {
        let gate = self
            .flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        FlightGuard {
            flights: &self.flights,
            key: key.to_string(),
            guard: Some(gate.lock_owned().await),
        }
    }

    pub async fn save_access_token(&self, item: AccessTokenItem) -> Result<()> {
        let args = self.notification(item.home_account_id.as_deref(), true);
        self.access(args, |state| {
            state.upsert_access_token(item);
            Ok(())
        })
        .await
    }

    pub async fn save_refresh_token(&self, item: RefreshTokenItem) -> Result<()> {
        let args = self.notification(Some(&item.home_account_id), true);
        self.access(args, |state| {
            state.upsert_refresh_token(item);
            Ok(())
        })
        .await
    }

    pub async fn save_id_token(&self, item: IdTokenItem) -> Result<()> {
        let args = self.notification(Some(&item.home_account_id), true);
        self.access(args, |state| {
            state.upsert_id_token(item);
            Ok(())
        })
        .await
    }

    pub async fn save_account(&self, item: AccountItem) -> Result<()> {
        let args = self.notification(Some(&item.home_account_id), true);
        self.access(args, |state| {
            state.upsert_account(item);
            Ok(())
        })
        .await
    }

    /// Persist a token response as one logical write.
    ///
    /// Access tokens of the same partition, cloud and tenant whose scopes
    /// overlap the new token are dropped first so a scope can only ever be
    /// served by one token.
    pub async fn save_token_response(&self, write: &TokenWrite<'_>) -> Result<SavedTokens> {
        let metadata = self.instance_metadata(write.authority).await?;
        let environment = metadata.preferred_cache.clone();
        let now = self.clock.now();
        let response = write.response;
        let home_account_id = write.home_account_id();
        let tenant_id = write.authority.tenant().to_string();

        let (expires_on, extended_expires_on) = response.expiry_from(now)?;

        let access_token = AccessTokenItem {
            environment: environment.clone(),
            client_id: self.client_id.clone(),
            home_account_id: home_account_id.clone(),
            tenant_id: tenant_id.clone(),
            secret: response.access_token.clone(),
            token_type: response.token_type.clone(),
            scopes: write.scopes.clone(),
            cached_at: now,
            expires_on,
            extended_expires_on,
            user_assertion_hash: write.user_assertion_hash.map(str::to_string),
            is_adfs: write.authority.authority_type() == AuthorityType::Adfs,
        };

        let account_item = match (write.id_token, home_account_id.as_deref()) {
            (Some(id_token), Some(home)) => Some(AccountItem {
                home_account_id: home.to_string(),
                environment: environment.clone(),
                realm: tenant_id.clone(),
                local_account_id: id_token.object_id().unwrap_or_default().to_string(),
                username: id_token.username().unwrap_or_default().to_string(),
                name: id_token.claims.name.clone(),
                kind: match write.authority.authority_type() {
                    AuthorityType::Adfs => AccountKind::Adfs,
                    AuthorityType::B2C => AccountKind::B2C,
                    AuthorityType::Aad => AccountKind::for_aad_tenant(
                        id_token.tenant_id().unwrap_or(&tenant_id),
                    ),
                },
            }),
            _ => None,
        };
        let account = account_item.as_ref().map(AccountItem::to_account);
        let mirror_legacy = legacy::should_mirror(write, self.options.legacy_cache_compatibility);

        let args = self.notification(home_account_id.as_deref(), true);
        let saved = access_token.clone();
        self.access(args, |state| {
            let removed = state.remove_access_tokens_where(|existing| {
                existing.client_id.eq_ignore_ascii_case(&access_token.client_id)
                    && existing.partition().eq_ignore_ascii_case(access_token.partition())
                    && existing.user_assertion_hash == access_token.user_assertion_hash
                    && metadata.is_alias(&existing.environment)
                    && existing.tenant_id.eq_ignore_ascii_case(&access_token.tenant_id)
                    && existing.scopes.intersects(&access_token.scopes)
            });
            if removed > 0 {
                debug!(removed, "replaced overlapping access tokens");
            }
            state.upsert_access_token(access_token);

            if let (Some(id_token), Some(home)) = (write.id_token, home_account_id.as_deref()) {
                state.upsert_id_token(IdTokenItem {
                    environment: environment.clone(),
                    client_id: self.client_id.clone(),
                    home_account_id: home.to_string(),
                    tenant_id: tenant_id.clone(),
                    secret: id_token.raw.clone().into(),
                });
            }
            if let Some(item) = account_item {
                state.upsert_account(item);
            }
            if let (Some(refresh_token), Some(home)) =
                (&response.refresh_token, home_account_id.as_deref())
            {
                state.upsert_refresh_token(RefreshTokenItem {
                    environment: environment.clone(),
                    client_id: self.client_id.clone(),
                    home_account_id: home.to_string(),
                    secret: refresh_token.clone(),
                    raw_client_info: response.client_info.clone(),
                });
            }
            if mirror_legacy {
                if let Some(home) = home_account_id.as_deref() {
                    legacy::mirror(state, write, &self.client_id, home, &environment);
                }
            }
            Ok(())
        })
        .await?;

        Ok(SavedTokens { access_token: saved, account })
    }

    /// Everything a cache-reading request needs, read under one
    /// `before_access`/`after_access` pair: the access token and its ID
    /// token, or the refresh token to redeem when no access token is served.
    pub async fn lookup(&self, query: &TokenQuery<'_>, read_access_token: bool) -> Result<CacheLookup> {
        let metadata = self.instance_metadata(query.authority).await?;
        let now = self.clock.now();
        let args = self.notification(query.account.map(|a| a.home_account_id.as_str()), false);

        self.access(args, |state| {
            let access_token = if read_access_token {
                self.select_access_token(state, query, &metadata, now)?
            } else {
                None
            };
            let id_token =
                access_token.as_ref().and_then(|item| self.select_id_token(state, &metadata, item));
            let refresh_token = match (&access_token, query.account) {
                (None, Some(account)) => self.select_refresh_token(state, &metadata, account),
                _ => None,
            };
            Ok(CacheLookup { access_token, id_token, refresh_token })
        })
        .await
    }

    /// Find an access token usable for `query`.
    ///
    /// Only tokens whose scopes are a superset of the requested scopes
    /// qualify. Expired tokens are skipped but left in place.
    pub async fn find_access_token(&self, query: &TokenQuery<'_>) -> Result<Option<AccessTokenItem>> {
        if query.partition().is_none() {
            return Ok(None);
        }

        let metadata = self.instance_metadata(query.authority).await?;
        let now = self.clock.now();
        let args = self.notification(query.account.map(|a| a.home_account_id.as_str()), false);
        self.access(args, |state| self.select_access_token(state, query, &metadata, now)).await
    }

    /// Refresh token for the query's account, looked up under the
    /// preferred-cache host first and then each alias.
    pub async fn find_refresh_token(
        &self,
        query: &TokenQuery<'_>,
    ) -> Result<Option<RefreshTokenItem>> {
        let Some(account) = query.account else {
            return Ok(None);
        };

        let metadata = self.instance_metadata(query.authority).await?;
        let args = self.notification(Some(&account.home_account_id), false);
        self.access(args, |state| Ok(self.select_refresh_token(state, &metadata, account))).await
    }

    /// ID token written alongside `access_token`, if it has an account.
    pub async fn find_id_token(
        &self,
        query: &TokenQuery<'_>,
        access_token: &AccessTokenItem,
    ) -> Result<Option<IdTokenItem>> {
        let Some(home) = access_token.home_account_id.as_deref() else {
            return Ok(None);
        };

        let metadata = self.instance_metadata(query.authority).await?;
        let args = self.notification(Some(home), false);
        self.access(args, |state| Ok(self.select_id_token(state, &metadata, access_token))).await
    }

    fn select_access_token(
        &self,
        state: &CacheState,
        query: &TokenQuery<'_>,
        metadata: &InstanceMetadata,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessTokenItem>> {
        if query.partition().is_none() {
            return Ok(None);
        }
        let buffer = self.expiration_buffer();
        let extended = self.options.extended_lifetime_enabled;

        let mut candidates: Vec<&AccessTokenItem> = state
            .access_tokens
            .values()
            .filter(|item| item.client_id.eq_ignore_ascii_case(&self.client_id))
            .filter(|item| query.matches_partition(item))
            .filter(|item| metadata.is_alias(&item.environment))
            .filter(|item| query.matches_tenant(item))
            .filter(|item| item.scopes.contains_all(query.scopes))
            .filter(|item| {
                !item.is_expired(now, buffer)
                    || (extended && item.is_within_extended_lifetime(now, buffer))
            })
            .collect();

        let preferred =
            |item: &&AccessTokenItem| item.environment.eq_ignore_ascii_case(&metadata.preferred_cache);
        if candidates.len() > 1 && candidates.iter().any(preferred) {
            candidates.retain(preferred);
        }
        debug!(candidates = candidates.len(), "access token lookup");

        match candidates.as_slice() {
            [] => Ok(None),
            [item] => Ok(Some((*item).clone())),
            _ => Err(AuthError::MultipleTokensMatched),
        }
    }

    fn select_refresh_token(
        &self,
        state: &CacheState,
        metadata: &InstanceMetadata,
        account: &Account,
    ) -> Option<RefreshTokenItem> {
        for environment in metadata.lookup_order() {
            let key = RefreshTokenItem::key_for(&account.home_account_id, &environment, &self.client_id);
            if let Some(item) = state.refresh_tokens.get(&key) {
                return Some(item.clone());
            }
        }
        if self.options.legacy_cache_compatibility {
            let item = legacy::find(state, metadata, &self.client_id, account);
            if item.is_some() {
                debug!("refresh token served from legacy layout");
            }
            return item;
        }
        None
    }

    fn select_id_token(
        &self,
        state: &CacheState,
        metadata: &InstanceMetadata,
        access_token: &AccessTokenItem,
    ) -> Option<IdTokenItem> {
        let home = access_token.home_account_id.as_deref()?;
        metadata.lookup_order().iter().find_map(|environment| {
            let key = credential_key(
                home,
                environment,
                CredentialType::IdToken,
                &self.client_id,
                &access_token.tenant_id,
                "",
            );
            state.id_tokens.get(&key).cloned()
        })
    }

    /// Forget an account: its tokens for this client across every alias of
    /// its cloud, its account records and its legacy entries.
    pub async fn remove_account(&self, account: &Account) -> Result<usize> {
        let metadata = self.environment_metadata(&account.environment).await?;
        let client_id = self.client_id.as_str();
        let home = account.home_account_id.as_str();
        let args = self.notification(Some(home), true);

        self.access(args, |state| {
            let owned = |item_client: &str, item_home: &str, environment: &str| {
                item_client.eq_ignore_ascii_case(client_id)
                    && item_home.eq_ignore_ascii_case(home)
                    && metadata.is_alias(environment)
            };

            let mut removed = state.remove_access_tokens_where(|item| {
                owned(&item.client_id, item.home_account_id.as_deref().unwrap_or_default(), &item.environment)
            });

            let before = state.refresh_tokens.len() + state.id_tokens.len() + state.accounts.len();
            state.refresh_tokens.retain(|_, item| {
                !owned(&item.client_id, &item.home_account_id, &item.environment)
            });
            state.id_tokens.retain(|_, item| {
                !owned(&item.client_id, &item.home_account_id, &item.environment)
            });
            state.accounts.retain(|_, item| {
                !(item.home_account_id.eq_ignore_ascii_case(home)
                    && metadata.is_alias(&item.environment))
            });
            let dropped =
                before - (state.refresh_tokens.len() + state.id_tokens.len() + state.accounts.len());
            if dropped > 0 {
                state.mark_changed();
            }
            removed += dropped;
            removed += legacy::remove(state, client_id, account);

            debug!(removed, "account removed from cache");
            Ok(removed)
        })
        .await
    }

    /// Accounts this client can sign in silently, deduplicated by home
    /// account id.
    pub async fn get_accounts(&self) -> Result<Vec<Account>> {
        let client_id = self.client_id.as_str();
        let legacy_enabled = self.options.legacy_cache_compatibility;
        let args = self.notification(None, false);

        self.access(args, |state| {
            let signed_in: HashSet<String> = state
                .refresh_tokens
                .values()
                .filter(|rt| rt.client_id.eq_ignore_ascii_case(client_id))
                .map(|rt| rt.home_account_id.to_lowercase())
                .collect();

            let mut accounts: BTreeMap<String, Account> = BTreeMap::new();
            for item in state.accounts.values() {
                let home = item.home_account_id.to_lowercase();
                if signed_in.contains(&home) {
                    accounts.entry(home).or_insert_with(|| item.to_account());
                }
            }
            if legacy_enabled {
                for account in legacy::accounts(state, client_id) {
                    accounts.entry(account.home_account_id.to_lowercase()).or_insert(account);
                }
            }
            Ok(accounts.into_values().collect())
        })
        .await
    }

    /// JSON snapshot of the whole cache.
    pub async fn serialize(&self) -> Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        let bytes = state.to_bytes()?;
        state.mark_clean();
        Ok(bytes)
    }

    /// Replace the cache with a snapshot; an empty slice clears it.
    pub async fn deserialize(&self, bytes: &[u8]) -> Result<()> {
        let fresh = CacheState::from_bytes(bytes)?;
        *self.state.lock().await = fresh;
        Ok(())
    }

    pub async fn counts(&self) -> CacheCounts {
        let state = self.state.lock().await;
        CacheCounts {
            access_tokens: state.access_token_count(),
            refresh_tokens: state.refresh_token_count(),
            id_tokens: state.id_token_count(),
            accounts: state.account_count(),
            legacy_refresh_tokens: state.legacy_refresh_token_count(),
        }
    }

    /// Writes not yet handed to persistence or taken by [`Self::serialize`].
    pub async fn has_state_changed(&self) -> bool {
        self.state.lock().await.has_state_changed()
    }
}

/// Exclusive hold on one flight key, from [`TokenCache::lock_flight`].
#[must_use = "the flight is released as soon as the guard is dropped"]
pub struct FlightGuard<'a> {
    flights: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl fmt::Debug for FlightGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightGuard").field("key", &self.key).finish_non_exhaustive()
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map itself still references an idle gate.
        self.flights.remove_if(&self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tokenflow_common::MockClock;
    use tokenflow_domain::{ScopeSet, Secret, TokenResponse};

    use super::*;

    fn cache() -> (TokenCache, MockClock) {
        let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        (TokenCache::new("client").with_clock(Arc::new(clock.clone())), clock)
    }

    fn app_response(token: &str, scope: &str) -> TokenResponse {
        TokenResponse {
            access_token: Secret::new(token),
            token_type: "Bearer".into(),
            expires_in: 3600,
            scope: Some(scope.into()),
            ..TokenResponse::default()
        }
    }

    async fn save_app_token(cache: &TokenCache, authority: &AuthorityInfo, token: &str, scope: &str) {
        let response = app_response(token, scope);
        let write = TokenWrite {
            authority,
            scopes: ScopeSet::from_scope_string(scope),
            response: &response,
            id_token: None,
            client_info: None,
            user_assertion_hash: None,
            is_client_credential: true,
        };
        cache.save_token_response(&write).await.unwrap();
    }

    #[tokio::test]
    async fn app_token_is_found_by_subset_and_not_by_intersection() {
        let (cache, _clock) = cache();
        let authority = AuthorityInfo::parse("https://login.microsoftonline.com/tenant").unwrap();
        save_app_token(&cache, &authority, "at", "a b").await;

        let subset = ScopeSet::from_scope_string("a");
        let query = TokenQuery {
            authority: &authority,
            scopes: &subset,
            account: None,
            user_assertion_hash: None,
            is_client_credential: true,
        };
        let found = cache.find_access_token(&query).await.unwrap().unwrap();
        assert_eq!(found.secret.expose(), "at");
        assert_eq!(found.environment, "login.windows.net");
        assert_eq!(found.home_account_id, None);

        let overlapping = ScopeSet::from_scope_string("a c");
        let query = TokenQuery { scopes: &overlapping, ..query };
        assert!(cache.find_access_token(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overlapping_write_replaces_previous_token() {
        let (cache, _clock) = cache();
        let authority = AuthorityInfo::parse("https://login.microsoftonline.com/tenant").unwrap();
        save_app_token(&cache, &authority, "first", "a b").await;
        save_app_token(&cache, &authority, "second", "b c").await;
        save_app_token(&cache, &authority, "third", "d").await;

        assert_eq!(cache.counts().await.access_tokens, 2);
    }

    /// Validates expiry handling against the buffer.
    ///
    /// Assertions:
    /// - Ensures a token inside the buffer window is not returned.
    /// - Ensures the token is still stored afterwards.
    #[tokio::test]
    async fn expired_tokens_are_skipped_not_deleted() {
        let (cache, clock) = cache();
        let authority = AuthorityInfo::parse("https://login.microsoftonline.com/tenant").unwrap();
        save_app_token(&cache, &authority, "at", "a").await;

        clock.advance(Duration::minutes(56));
        let scopes = ScopeSet::from_scope_string("a");
        let query = TokenQuery {
            authority: &authority,
            scopes: &scopes,
            account: None,
            user_assertion_hash: None,
            is_client_credential: true,
        };
        assert!(cache.find_access_token(&query).await.unwrap().is_none());
        assert_eq!(cache.counts().await.access_tokens, 1);
    }

    #[tokio::test]
    async fn deserialize_empty_clears() {
        let (cache, _clock) = cache();
        let authority = AuthorityInfo::parse("https://login.microsoftonline.com/tenant").unwrap();
        save_app_token(&cache, &authority, "at", "a").await;
        assert!(cache.has_state_changed().await);

        let snapshot = cache.serialize().await.unwrap();
        assert!(!cache.has_state_changed().await);
        cache.deserialize(&[]).await.unwrap();
        assert_eq!(cache.counts().await, CacheCounts::default());

        cache.deserialize(&snapshot).await.unwrap();
        assert_eq!(cache.serialize().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn flight_lock_is_per_key() {
        let (cache, _clock) = cache();
        let _held = cache.lock_flight("a").await;
        let other = tokio::time::timeout(std::time::Duration::from_millis(50), cache.lock_flight("b"))
            .await;
        assert!(other.is_ok());
        let same = tokio::time::timeout(std::time::Duration::from_millis(50), cache.lock_flight("a"))
            .await;
        assert!(same.is_err());
    }

    #[tokio::test]
    async fn released_flights_are_forgotten() {
        let (cache, _clock) = cache();
        for n in 0..1000 {
            let _guard = cache.lock_flight(&format!("assertion-{n}")).await;
        }
        assert!(cache.flights.is_empty());
    }

    /// Validates flight cleanup with a waiter.
    ///
    /// Assertions:
    /// - Ensures the key survives while another request waits on it.
    /// - Ensures the key is dropped once the waiter releases it too.
    #[tokio::test]
    async fn waiting_flight_keeps_its_key() {
        let cache = Arc::new(cache().0);
        let first = cache.lock_flight("shared").await;

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let _second = cache.lock_flight("shared").await;
            })
        };
        // map + held guard + waiter
        while cache.flights.get("shared").map_or(0, |gate| Arc::strong_count(gate.value())) < 3 {
            tokio::task::yield_now().await;
        }

        drop(first);
        assert!(cache.flights.contains_key("shared"));
        waiter.await.unwrap();
        assert!(cache.flights.is_empty());
    }
}
