use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A signed-in user as seen by the application.
///
/// Identity is the home account id; two values with the same home account
/// id are the same account regardless of environment or username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// `uid.utid` from client info
    pub home_account_id: String,
    /// Host the account was signed in through
    pub environment: String,
    pub username: Option<String>,
}

impl Account {
    pub fn new(
        home_account_id: impl Into<String>,
        environment: impl Into<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            environment: environment.into(),
            username,
        }
    }

    /// Tenant part of the home account id, if it has the `uid.utid` shape.
    pub fn home_tenant_id(&self) -> Option<&str> {
        self.home_account_id.split_once('.').map(|(_, utid)| utid).filter(|t| !t.is_empty())
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.home_account_id.eq_ignore_ascii_case(&other.home_account_id)
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.home_account_id.to_lowercase().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn identity_is_home_account_id() {
        let a = Account::new("uid.utid", "login.microsoftonline.com", Some("a@b".into()));
        let b = Account::new("UID.UTID", "login.windows.net", None);
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn home_tenant_from_home_account_id() {
        assert_eq!(Account::new("u.t", "env", None).home_tenant_id(), Some("t"));
        assert_eq!(Account::new("legacy", "env", None).home_tenant_id(), None);
    }
}
