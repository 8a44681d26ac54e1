use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cask_types::{BrowseOptions, DownloadOptions, FetchOptions, FileHandle, Health, UploadOptions};
use tracing::{debug, info};

use crate::client::{ClientConnector, ObjectClient, PutObject};
use crate::error::{StoreError, StoreResult};
use crate::fsutil::{cached_destination, require_target, write_atomically};
use crate::issuer::{DefaultIssuer, HandleIssuer};
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::resolver::plan_upload;
use crate::settings::RemoteSettings;
use crate::traits::{Connection, FetchStream};

/// Remote object store on an S3-compatible service.
///
/// Every object lives in the configured bucket under the key
/// `{root}/{name}` resolved from its handle, identical to the relative path
/// the local backend would use. Uploads always PUT; the service's overwrite
/// semantics make that idempotent.
pub struct RemoteObjectStore {
    settings: RemoteSettings,
    issuer: Arc<dyn HandleIssuer>,
    connector: Arc<dyn ClientConnector>,
    lifecycle: Lifecycle<Arc<dyn ObjectClient>>,
}

impl RemoteObjectStore {
    /// Registered name of this driver.
    pub const DRIVER: &'static str = "s3";

    pub fn new(
        settings: RemoteSettings,
        issuer: Arc<dyn HandleIssuer>,
        connector: Arc<dyn ClientConnector>,
    ) -> Self {
        Self {
            settings,
            issuer,
            connector,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Store using `connector` and the [`DefaultIssuer`].
    pub fn with_connector(settings: RemoteSettings, connector: Arc<dyn ClientConnector>) -> Self {
        Self::new(settings, Arc::new(DefaultIssuer), connector)
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }

    /// Object key of `file` within the bucket.
    pub fn key_of(file: &FileHandle) -> StoreResult<String> {
        Ok(file.object_path()?.object().to_string())
    }

    async fn ensure_bucket(&self, client: &dyn ObjectClient) -> StoreResult<()> {
        let bucket = &self.settings.bucket;
        if client.bucket_exists(bucket).await? {
            debug!(bucket = %bucket, "bucket present");
            return Ok(());
        }
        client
            .create_bucket(bucket, self.settings.region.as_deref())
            .await?;
        info!(bucket = %bucket, region = ?self.settings.region, "bucket created");
        Ok(())
    }
}

#[async_trait]
impl Connection for RemoteObjectStore {
    fn driver(&self) -> &'static str {
        Self::DRIVER
    }

    fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    async fn open(&self) -> StoreResult<()> {
        if !self.lifecycle.needs_open()? {
            return Ok(());
        }
        let client = self
            .connector
            .connect(&self.settings)
            .map_err(StoreError::into_connection)?;
        self.ensure_bucket(client.as_ref())
            .await
            .map_err(StoreError::into_connection)?;
        self.lifecycle.mark_open(client)?;
        info!(
            endpoint = %self.settings.endpoint_url(),
            bucket = %self.settings.bucket,
            "remote store opened"
        );
        Ok(())
    }

    fn health(&self) -> Health {
        self.lifecycle.health()
    }

    fn record_health(&self, health: Health) {
        self.lifecycle.record_health(health);
    }

    async fn close(&self) -> StoreResult<()> {
        if self.lifecycle.close() {
            info!(bucket = %self.settings.bucket, "remote store closed");
        }
        Ok(())
    }

    async fn upload(&self, source: &Path, opts: &UploadOptions) -> StoreResult<FileHandle> {
        let client = self.lifecycle.session()?;
        let plan = plan_upload(source, opts, &self.issuer).await?;

        let request = PutObject {
            bucket: self.settings.bucket.clone(),
            key: plan.path.object().to_string(),
            source: source.to_path_buf(),
            size: plan.handle.size(),
            content_type: opts.mimetype.clone(),
            metadata: opts.metadata_strings(),
            tags: opts.tag_strings(),
            expires: opts.expires,
        };
        client.put_object(request).await?;
        debug!(object = %plan.path, bytes = plan.handle.size(), "object uploaded");
        Ok(plan.handle)
    }

    async fn fetch(&self, file: &FileHandle, opts: &FetchOptions) -> StoreResult<FetchStream> {
        let client = self.lifecycle.session()?;
        let key = Self::key_of(file)?;
        client
            .get_object(&self.settings.bucket, &key, opts.range)
            .await
    }

    async fn download(&self, file: &FileHandle, opts: &DownloadOptions) -> StoreResult<PathBuf> {
        let client = self.lifecycle.session()?;
        let key = Self::key_of(file)?;
        let target = require_target(&opts.target)?;
        if cached_destination(target, file.size()).await? {
            return Ok(target.to_path_buf());
        }

        let mut body = client
            .get_object(&self.settings.bucket, &key, None)
            .await?;
        let written = write_atomically(&mut body, target).await?;
        debug!(object = %file, target = %target.display(), bytes = written, "object downloaded");
        Ok(target.to_path_buf())
    }

    async fn remove(&self, file: &FileHandle) -> StoreResult<()> {
        let client = self.lifecycle.session()?;
        let key = Self::key_of(file)?;
        client.delete_object(&self.settings.bucket, &key).await?;
        debug!(object = %file, "object removed");
        Ok(())
    }

    async fn browse(&self, _file: &FileHandle, _opts: &BrowseOptions) -> StoreResult<String> {
        Err(StoreError::BrowseNotSupported)
    }
}

impl std::fmt::Debug for RemoteObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObjectStore")
            .field("settings", &self.settings)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
