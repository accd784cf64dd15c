//! Access grants of the in-memory library.
//!
//! A serialized grant is base64 (URL-safe, no padding) over JSON, so tests
//! can round-trip grants through `parseAccess` without a satellite.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uplink_runtime::{error_codes, NativeError, NativeResult, Permission, SharePrefix};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub satellite_address: String,
    pub api_key: String,
    pub passphrase: String,
    pub allow_download: bool,
    pub allow_upload: bool,
    pub allow_list: bool,
    pub allow_delete: bool,
    #[serde(default)]
    pub not_before: i64,
    #[serde(default)]
    pub not_after: i64,
    /// `(bucket, prefix)` pairs; empty means unrestricted.
    #[serde(default)]
    pub prefixes: Vec<(String, String)>,
    /// Encryption key overrides as `(bucket, prefix)`.
    #[serde(default)]
    pub overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    List,
    Delete,
}

impl Grant {
    pub fn root(satellite_address: &str, api_key: &str, passphrase: &str) -> NativeResult<Self> {
        if satellite_address.is_empty() {
            return Err(NativeError::new(
                error_codes::INTERNAL,
                "satellite address is required",
            ));
        }
        if api_key.is_empty() {
            return Err(NativeError::new(error_codes::INTERNAL, "invalid API key"));
        }
        Ok(Self {
            satellite_address: satellite_address.to_string(),
            api_key: api_key.to_string(),
            passphrase: passphrase.to_string(),
            allow_download: true,
            allow_upload: true,
            allow_list: true,
            allow_delete: true,
            not_before: 0,
            not_after: 0,
            prefixes: Vec::new(),
            overrides: Vec::new(),
        })
    }

    pub fn parse(serialized: &str) -> NativeResult<Self> {
        let invalid = || NativeError::new(error_codes::INTERNAL, "invalid access grant format");
        let raw = URL_SAFE_NO_PAD
            .decode(serialized.trim())
            .map_err(|_| invalid())?;
        serde_json::from_slice(&raw).map_err(|_| invalid())
    }

    pub fn serialize(&self) -> NativeResult<String> {
        let raw = serde_json::to_vec(self)
            .map_err(|e| NativeError::new(error_codes::INTERNAL, e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Restrict the grant. Permissions only ever narrow.
    pub fn share(&self, permission: &Permission, prefixes: &[SharePrefix]) -> NativeResult<Self> {
        if !(permission.allow_download
            || permission.allow_upload
            || permission.allow_list
            || permission.allow_delete)
        {
            return Err(NativeError::new(
                error_codes::INTERNAL,
                "permission is empty",
            ));
        }
        let mut shared = self.clone();
        shared.allow_download &= permission.allow_download;
        shared.allow_upload &= permission.allow_upload;
        shared.allow_list &= permission.allow_list;
        shared.allow_delete &= permission.allow_delete;
        shared.not_before = permission.not_before;
        shared.not_after = permission.not_after;
        shared.prefixes = prefixes
            .iter()
            .map(|p| (p.bucket.clone(), p.prefix.clone()))
            .collect();
        Ok(shared)
    }

    pub fn check(&self, action: Action, bucket: &str, key: &str) -> NativeResult<()> {
        let allowed = match action {
            Action::Read => self.allow_download,
            Action::Write => self.allow_upload,
            Action::List => self.allow_list,
            Action::Delete => self.allow_delete,
        };
        let in_scope = self.prefixes.is_empty()
            || self
                .prefixes
                .iter()
                .any(|(b, p)| b == bucket && key.starts_with(p.as_str()));
        if allowed && in_scope {
            Ok(())
        } else {
            Err(NativeError::new(
                error_codes::PERMISSION_DENIED,
                format!("{action:?} on {bucket}/{key}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_grant_parses_back() {
        let grant = Grant::root("sat.test:7777", "key", "secret").unwrap();
        let serialized = grant.serialize().unwrap();
        assert_eq!(Grant::parse(&serialized).unwrap(), grant);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = Grant::parse("not a grant!").unwrap_err();
        assert_eq!(err.code, error_codes::INTERNAL);
    }

    #[test]
    fn shared_grant_is_scoped() {
        let root = Grant::root("sat.test:7777", "key", "secret").unwrap();
        let permission = Permission {
            allow_download: true,
            allow_list: true,
            ..Permission::default()
        };
        let prefixes = [SharePrefix {
            bucket: "photos".into(),
            prefix: "2024/".into(),
        }];
        let shared = root.share(&permission, &prefixes).unwrap();
        assert!(shared.check(Action::Read, "photos", "2024/a.jpg").is_ok());
        assert!(shared.check(Action::Read, "photos", "2023/a.jpg").is_err());
        assert_eq!(
            shared.check(Action::Write, "photos", "2024/a.jpg").unwrap_err().code,
            error_codes::PERMISSION_DENIED
        );
    }
}
