use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, Result};

/// Identity echoed by the token endpoint when `client_info=1` is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub uid: String,
    pub utid: String,
}

impl ClientInfo {
    /// Decode the base64url JSON payload.
    ///
    /// # Errors
    /// `InvalidClientInfo` when the value is not base64url JSON with
    /// non-empty `uid` and `utid`.
    pub fn parse(raw: &str) -> Result<Self> {
        let bytes = decode_base64url(raw).map_err(AuthError::InvalidClientInfo)?;
        let info: Self = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidClientInfo(e.to_string()))?;
        if info.uid.is_empty() || info.utid.is_empty() {
            return Err(AuthError::InvalidClientInfo("uid and utid are required".to_string()));
        }
        Ok(info)
    }

    /// `uid.utid`, the cross-tenant account identifier.
    pub fn home_account_id(&self) -> String {
        format!("{}.{}", self.uid, self.utid)
    }

    pub fn encode(&self) -> String {
        let json = serde_json::json!({ "uid": self.uid, "utid": self.utid });
        URL_SAFE_NO_PAD.encode(json.to_string())
    }
}

/// Decode base64url with or without padding.
pub(crate) fn decode_base64url(raw: &str) -> std::result::Result<Vec<u8>, String> {
    URL_SAFE_NO_PAD.decode(raw.trim().trim_end_matches('=')).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_home_account_id() {
        let info = ClientInfo { uid: "oid-1".into(), utid: "tenant-1".into() };
        let parsed = ClientInfo::parse(&info.encode()).unwrap();
        assert_eq!(parsed.home_account_id(), "oid-1.tenant-1");
    }

    #[test]
    fn accepts_padded_input() {
        let encoded = format!("{}==", ClientInfo { uid: "a".into(), utid: "b".into() }.encode());
        assert!(ClientInfo::parse(&encoded).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(ClientInfo::parse("%%%"), Err(AuthError::InvalidClientInfo(_))));
        let missing = URL_SAFE_NO_PAD.encode(r#"{"uid":"only"}"#);
        assert!(matches!(ClientInfo::parse(&missing), Err(AuthError::InvalidClientInfo(_))));
    }
}
