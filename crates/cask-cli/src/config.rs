//! `cask.toml` loading.
//!
//! ```toml
//! default = "archive"
//!
//! [backends.archive]
//! driver = "local"
//! settings = { path = "/var/lib/cask" }
//!
//! [backends.media]
//! driver = "minio"
//! settings = { endpoint = "minio:9000", bucket = "media", accesskey = "...", secretkey = "..." }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use cask_store::SettingsMap;
use serde::Deserialize;

/// Name of the backend used when no configuration file exists.
pub const FALLBACK_BACKEND: &str = "local";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaskConfig {
    /// Backend used when `--backend` is not given.
    pub default: Option<String>,
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Registered driver name, e.g. `local` or `s3`.
    pub driver: String,
    #[serde(default)]
    pub settings: toml::Table,
}

impl BackendConfig {
    /// Settings as the JSON-valued map drivers consume.
    pub fn settings_map(&self) -> anyhow::Result<SettingsMap> {
        self.settings
            .iter()
            .map(|(name, value)| {
                let value = serde_json::to_value(value)
                    .with_context(|| format!("setting {name} is not representable"))?;
                Ok((name.clone(), value))
            })
            .collect()
    }
}

impl CaskConfig {
    /// Read `path`, or fall back to a single local backend with default
    /// settings when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using local defaults");
            return Ok(Self::fallback());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        if let Some(default) = &config.default {
            if !config.backends.contains_key(default) {
                bail!("default backend {default:?} is not configured");
            }
        }
        Ok(config)
    }

    fn fallback() -> Self {
        let mut backends = BTreeMap::new();
        backends.insert(
            FALLBACK_BACKEND.to_string(),
            BackendConfig {
                driver: FALLBACK_BACKEND.to_string(),
                settings: toml::Table::new(),
            },
        );
        Self {
            default: Some(FALLBACK_BACKEND.to_string()),
            backends,
        }
    }

    /// Pick the backend named `requested`, else the default, else the only
    /// configured one.
    pub fn select(&self, requested: Option<&str>) -> anyhow::Result<(&str, &BackendConfig)> {
        let name = match requested.or(self.default.as_deref()) {
            Some(name) => name,
            None if self.backends.len() == 1 => self
                .backends
                .keys()
                .next()
                .map(String::as_str)
                .unwrap_or_default(),
            None => bail!("several backends configured; pass --backend or set `default`"),
        };
        let (name, backend) = self
            .backends
            .get_key_value(name)
            .with_context(|| format!("backend {name:?} is not configured"))?;
        Ok((name.as_str(), backend))
    }
}
