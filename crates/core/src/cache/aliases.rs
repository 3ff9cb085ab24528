//! Built-in cloud instance alias groups

use async_trait::async_trait;
use tokenflow_domain::{AuthorityInfo, InstanceMetadata, Result};

use crate::ports::InstanceDiscovery;

/// `(preferred_network, preferred_cache, aliases)` per cloud.
const KNOWN_CLOUDS: &[(&str, &str, &[&str])] = &[
    (
        "login.microsoftonline.com",
        "login.windows.net",
        &["login.microsoftonline.com", "login.windows.net", "login.microsoft.com", "sts.windows.net"],
    ),
    (
        "login.partner.microsoftonline.cn",
        "login.partner.microsoftonline.cn",
        &["login.partner.microsoftonline.cn", "login.chinacloudapi.cn"],
    ),
    ("login.microsoftonline.de", "login.microsoftonline.de", &["login.microsoftonline.de"]),
    (
        "login.microsoftonline.us",
        "login.microsoftonline.us",
        &["login.microsoftonline.us", "login.usgovcloudapi.net"],
    ),
    ("login-us.microsoftonline.com", "login-us.microsoftonline.com", &["login-us.microsoftonline.com"]),
    (
        "login.windows-ppe.net",
        "login.windows-ppe.net",
        &["login.windows-ppe.net", "sts.windows-ppe.net", "login.microsoft-ppe.com"],
    ),
];

/// Instance metadata for a host from the built-in table, if it is known.
pub fn known_metadata(host: &str) -> Option<InstanceMetadata> {
    KNOWN_CLOUDS
        .iter()
        .find(|(_, _, aliases)| aliases.iter().any(|a| a.eq_ignore_ascii_case(host)))
        .map(|(network, cache, aliases)| InstanceMetadata {
            preferred_network: (*network).to_string(),
            preferred_cache: (*cache).to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
        })
}

pub fn is_known_host(host: &str) -> bool {
    known_metadata(host).is_some()
}

/// Offline instance discovery backed by the built-in alias table.
///
/// Hosts outside the table (ADFS, B2C, private clouds) alias only
/// themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticInstanceDiscovery;

#[async_trait]
impl InstanceDiscovery for StaticInstanceDiscovery {
    async fn metadata(&self, authority: &AuthorityInfo) -> Result<InstanceMetadata> {
        Ok(known_metadata(authority.host())
            .unwrap_or_else(|| InstanceMetadata::self_aliased(authority.host())))
    }
}
