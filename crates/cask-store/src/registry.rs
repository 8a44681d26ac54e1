//! Driver factories and the host-owned registry that names them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::client::ClientConnector;
use crate::error::{StoreError, StoreResult};
use crate::issuer::HandleIssuer;
use crate::local::LocalShardStore;
use crate::remote::RemoteObjectStore;
use crate::settings::{LocalSettings, RemoteSettings, SettingsMap};
use crate::traits::Connection;

/// Aliases under which [`LocalDriver`] is registered by
/// [`DriverRegistry::with_defaults`].
pub const LOCAL_ALIASES: &[&str] = &["local", "file", "disk"];

/// Aliases under which [`RemoteDriver`] is registered by
/// [`DriverRegistry::with_defaults`].
pub const REMOTE_ALIASES: &[&str] = &["s3", "minio", "object"];

/// Factory for unopened connections to one kind of backend.
///
/// `connect` is pure construction: settings are normalized, nothing is
/// opened or dialed.
pub trait Driver: Send + Sync {
    fn connect(
        &self,
        settings: &SettingsMap,
        issuer: Arc<dyn HandleIssuer>,
    ) -> StoreResult<Box<dyn Connection>>;
}

/// Driver for [`LocalShardStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalDriver;

impl Driver for LocalDriver {
    fn connect(
        &self,
        settings: &SettingsMap,
        issuer: Arc<dyn HandleIssuer>,
    ) -> StoreResult<Box<dyn Connection>> {
        let settings = LocalSettings::from_map(settings);
        Ok(Box::new(LocalShardStore::new(settings, issuer)))
    }
}

/// Driver for [`RemoteObjectStore`].
#[derive(Clone)]
pub struct RemoteDriver {
    connector: Arc<dyn ClientConnector>,
}

impl RemoteDriver {
    pub fn with_connector(connector: Arc<dyn ClientConnector>) -> Self {
        Self { connector }
    }

    /// Driver that talks to a real S3-compatible service.
    #[cfg(feature = "s3")]
    pub fn s3() -> Self {
        Self::with_connector(Arc::new(crate::s3::S3Connector))
    }
}

impl Driver for RemoteDriver {
    fn connect(
        &self,
        settings: &SettingsMap,
        issuer: Arc<dyn HandleIssuer>,
    ) -> StoreResult<Box<dyn Connection>> {
        let settings = RemoteSettings::from_map(settings);
        Ok(Box::new(RemoteObjectStore::new(
            settings,
            issuer,
            Arc::clone(&self.connector),
        )))
    }
}

/// Name-to-driver table, built and owned by the host application.
///
/// Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the local driver and, with the `s3` feature, the
    /// S3 driver under their usual aliases.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert_aliases(LOCAL_ALIASES, Arc::new(LocalDriver));
        #[cfg(feature = "s3")]
        registry.insert_aliases(REMOTE_ALIASES, Arc::new(RemoteDriver::s3()));
        registry
    }

    fn insert_aliases(&mut self, names: &[&str], driver: Arc<dyn Driver>) {
        for name in names {
            self.drivers
                .insert(name.to_ascii_lowercase(), Arc::clone(&driver));
        }
    }

    /// Register `driver` under every name in `names`.
    ///
    /// Fails without registering anything if any name is already taken.
    pub fn register(&mut self, names: &[&str], driver: Arc<dyn Driver>) -> StoreResult<()> {
        let names: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
        if let Some(taken) = names.iter().find(|n| self.drivers.contains_key(*n)) {
            return Err(StoreError::InvalidInput(format!(
                "driver {taken} is already registered"
            )));
        }
        for name in names {
            self.drivers.insert(name, Arc::clone(&driver));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    /// Build an unopened connection with the driver registered as `name`.
    pub fn connect(
        &self,
        name: &str,
        settings: &SettingsMap,
        issuer: Arc<dyn HandleIssuer>,
    ) -> StoreResult<Box<dyn Connection>> {
        let driver = self
            .get(name)
            .ok_or_else(|| StoreError::InvalidInput(format!("unknown driver {name:?}")))?;
        let connection = driver.connect(settings, issuer)?;
        debug!(driver = name, "connection created");
        Ok(connection)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
