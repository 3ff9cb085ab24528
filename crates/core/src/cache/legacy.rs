//! Single-refresh-token-per-user layout shared with older clients

use tokenflow_domain::{
    Account, AuthorityType, InstanceMetadata, LegacyRefreshTokenItem, RefreshTokenItem,
};

use super::query::TokenWrite;
use super::state::CacheState;

/// Whether a response should also be written in the legacy layout.
pub(crate) fn should_mirror(write: &TokenWrite<'_>, enabled: bool) -> bool {
    enabled
        && !write.is_client_credential
        && write.authority.authority_type() != AuthorityType::B2C
        && write.response.refresh_token.is_some()
        && write.id_token.is_some()
}

/// Replace the legacy entry of this user with the fresh refresh token.
pub(crate) fn mirror(
    state: &mut CacheState,
    write: &TokenWrite<'_>,
    client_id: &str,
    home_account_id: &str,
    environment: &str,
) {
    let (Some(refresh_token), Some(id_token)) = (&write.response.refresh_token, write.id_token)
    else {
        return;
    };

    let before = state.legacy_refresh_tokens.len();
    state.legacy_refresh_tokens.retain(|_, item| {
        !(item.client_id.eq_ignore_ascii_case(client_id)
            && item.home_account_id.eq_ignore_ascii_case(home_account_id))
    });
    if before != state.legacy_refresh_tokens.len() {
        state.mark_changed();
    }

    state.upsert_legacy_refresh_token(LegacyRefreshTokenItem {
        authority: write.authority.canonical().to_string(),
        client_id: client_id.to_string(),
        unique_id: id_token.object_id().unwrap_or_default().to_string(),
        displayable_id: id_token.username().unwrap_or_default().to_string(),
        home_account_id: home_account_id.to_string(),
        environment: environment.to_string(),
        secret: refresh_token.clone(),
        raw_client_info: write.response.client_info.clone(),
        scopes: write.scopes.clone(),
    });
}

/// Legacy refresh token for `account`, preferring the preferred-cache host.
///
/// Entries written without client info carry no home account id; those
/// match on the displayable username instead.
pub(crate) fn find(
    state: &CacheState,
    metadata: &InstanceMetadata,
    client_id: &str,
    account: &Account,
) -> Option<RefreshTokenItem> {
    let matches = |item: &&LegacyRefreshTokenItem| {
        item.client_id.eq_ignore_ascii_case(client_id)
            && metadata.is_alias(&item.environment)
            && if item.home_account_id.is_empty() {
                account
                    .username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(&item.displayable_id))
            } else {
                item.home_account_id.eq_ignore_ascii_case(&account.home_account_id)
            }
    };

    let mut candidates: Vec<&LegacyRefreshTokenItem> =
        state.legacy_refresh_tokens.values().filter(matches).collect();
    candidates.sort_by_key(|item| !item.environment.eq_ignore_ascii_case(&metadata.preferred_cache));

    candidates.first().map(|item| RefreshTokenItem {
        environment: item.environment.clone(),
        client_id: item.client_id.clone(),
        home_account_id: account.home_account_id.clone(),
        secret: item.secret.clone(),
        raw_client_info: item.raw_client_info.clone(),
    })
}

/// Drop every legacy entry of `account` for this client.
pub(crate) fn remove(state: &mut CacheState, client_id: &str, account: &Account) -> usize {
    let before = state.legacy_refresh_tokens.len();
    state.legacy_refresh_tokens.retain(|_, item| {
        let same_user = item.home_account_id.eq_ignore_ascii_case(&account.home_account_id)
            || (item.home_account_id.is_empty()
                && account
                    .username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(&item.displayable_id)));
        !(item.client_id.eq_ignore_ascii_case(client_id) && same_user)
    });
    let removed = before - state.legacy_refresh_tokens.len();
    if removed > 0 {
        state.mark_changed();
    }
    removed
}

/// Accounts known only from legacy entries.
pub(crate) fn accounts(state: &CacheState, client_id: &str) -> Vec<Account> {
    state
        .legacy_refresh_tokens
        .values()
        .filter(|item| item.client_id.eq_ignore_ascii_case(client_id))
        .filter(|item| !item.home_account_id.is_empty())
        .map(|item| {
            let username = (!item.displayable_id.is_empty()).then(|| item.displayable_id.clone());
            Account::new(item.home_account_id.clone(), item.environment.clone(), username)
        })
        .collect()
}
