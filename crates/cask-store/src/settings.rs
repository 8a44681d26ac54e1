//! Typed backend settings.
//!
//! Drivers receive a loosely-typed, string-keyed map. Each logical field may
//! be spelled several ways; the accepted spellings are listed once per field
//! below and normalized into a typed struct at `connect` time. When more than
//! one spelling is present, the one listed last wins. Values of the wrong
//! type are ignored and the field keeps its default.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

/// Raw settings handed to a driver.
pub type SettingsMap = BTreeMap<String, Value>;

pub const ENDPOINT_KEYS: &[&str] = &["endpoint"];
pub const REGION_KEYS: &[&str] = &["region"];
pub const BUCKET_KEYS: &[&str] = &["bucket"];
pub const ACCESS_KEY_KEYS: &[&str] = &["access", "accesskey", "access_key"];
pub const SECRET_KEY_KEYS: &[&str] = &["secret", "secretkey", "secret_key"];
pub const TLS_KEYS: &[&str] = &["ssl", "tls", "use_ssl"];
pub const STORAGE_ROOT_KEYS: &[&str] = &["path", "root", "storage"];

pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:9000";
pub const DEFAULT_BUCKET: &str = "cask";
pub const DEFAULT_STORAGE_ROOT: &str = "store";

/// Settings for the local shard backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSettings {
    /// Directory under which shard directories are created.
    pub root: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORAGE_ROOT),
        }
    }
}

impl LocalSettings {
    pub fn from_map(map: &SettingsMap) -> Self {
        let mut settings = Self::default();
        if let Some(root) = read_string(map, STORAGE_ROOT_KEYS) {
            settings.root = PathBuf::from(root);
        }
        settings
    }
}

/// Settings for the remote object backend.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    /// `host:port`, or a full URL with scheme.
    pub endpoint: String,
    pub region: Option<String>,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            region: None,
            bucket: DEFAULT_BUCKET.into(),
            access_key: String::new(),
            secret_key: String::new(),
            use_ssl: false,
        }
    }
}

impl RemoteSettings {
    pub fn from_map(map: &SettingsMap) -> Self {
        let mut settings = Self::default();
        if let Some(v) = read_string(map, ENDPOINT_KEYS) {
            settings.endpoint = v;
        }
        if let Some(v) = read_string(map, REGION_KEYS) {
            settings.region = Some(v).filter(|r| !r.is_empty());
        }
        if let Some(v) = read_string(map, BUCKET_KEYS) {
            settings.bucket = v;
        }
        if let Some(v) = read_string(map, ACCESS_KEY_KEYS) {
            settings.access_key = v;
        }
        if let Some(v) = read_string(map, SECRET_KEY_KEYS) {
            settings.secret_key = v;
        }
        if let Some(v) = read_bool(map, TLS_KEYS) {
            settings.use_ssl = v;
        }
        settings
    }

    /// Endpoint as a URL, adding a scheme from the TLS flag when missing.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else if self.use_ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

fn read_string(map: &SettingsMap, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .last()
        .map(str::to_string)
}

fn read_bool(map: &SettingsMap, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|k| match map.get(*k)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
        .last()
}
