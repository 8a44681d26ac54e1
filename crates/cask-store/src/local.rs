use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cask_types::{BrowseOptions, DownloadOptions, FetchOptions, FileHandle, Health, UploadOptions};
use tokio::fs::{self, File};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::fsutil::{cached_destination, native_path, open_range, require_target, write_atomically};
use crate::issuer::{DefaultIssuer, HandleIssuer};
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::resolver::plan_upload;
use crate::settings::LocalSettings;
use crate::traits::{Connection, FetchStream};

/// Local filesystem shard store.
///
/// Layout: `{root}/{hex[0..2]}/{hex[2..4]}/{url_safe_digest}[.{ext}]` for
/// content-addressed uploads, `{root}/{prefix}/{key}[.{ext}]` for uploads
/// with an explicit key. Objects already present are never rewritten.
pub struct LocalShardStore {
    settings: LocalSettings,
    issuer: Arc<dyn HandleIssuer>,
    lifecycle: Lifecycle<Arc<PathBuf>>,
}

impl LocalShardStore {
    /// Registered name of this driver.
    pub const DRIVER: &'static str = "local";

    /// Create an unopened store. No I/O happens until [`Connection::open`].
    pub fn new(settings: LocalSettings, issuer: Arc<dyn HandleIssuer>) -> Self {
        Self {
            settings,
            issuer,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Store rooted at `root` using the [`DefaultIssuer`].
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self::new(
            LocalSettings { root: root.into() },
            Arc::new(DefaultIssuer),
        )
    }

    pub fn settings(&self) -> &LocalSettings {
        &self.settings
    }

    /// Native path of `file` inside the open store.
    pub fn path_of(&self, file: &FileHandle) -> StoreResult<PathBuf> {
        let root = self.lifecycle.session()?;
        Ok(native_path(&root, &file.object_path()?))
    }
}

#[async_trait]
impl Connection for LocalShardStore {
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
        let root = &self.settings.root;
        fs::create_dir_all(root).await.map_err(|e| {
            StoreError::Connection(format!("cannot create storage root {}: {e}", root.display()))
        })?;
        self.lifecycle.mark_open(Arc::new(root.clone()))?;
        info!(root = %root.display(), "local store opened");
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
            info!(root = %self.settings.root.display(), "local store closed");
        }
        Ok(())
    }

    async fn upload(&self, source: &Path, opts: &UploadOptions) -> StoreResult<FileHandle> {
        let root = self.lifecycle.session()?;
        let plan = plan_upload(source, opts, &self.issuer).await?;
        let target = native_path(&root, &plan.path);

        // Check-then-write: two uploaders of the same path may both write,
        // last rename wins with identical bytes.
        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {
                debug!(object = %plan.path, "object already stored; skipping write");
                return Ok(plan.handle);
            }
            Ok(_) => {
                return Err(StoreError::InvalidInput(format!(
                    "{} is occupied by a directory",
                    plan.path
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut reader = File::open(source).await?;
        let written = write_atomically(&mut reader, &target).await?;
        debug!(object = %plan.path, bytes = written, "object stored");
        Ok(plan.handle)
    }

    async fn fetch(&self, file: &FileHandle, opts: &FetchOptions) -> StoreResult<FetchStream> {
        let path = self.path_of(file)?;
        open_range(&path, opts.range).await
    }

    async fn download(&self, file: &FileHandle, opts: &DownloadOptions) -> StoreResult<PathBuf> {
        let source = self.path_of(file)?;
        let target = require_target(&opts.target)?;
        if cached_destination(target, file.size()).await? {
            return Ok(target.to_path_buf());
        }

        let mut reader = File::open(&source)
            .await
            .map_err(|e| StoreError::from_fs(e, &source))?;
        let written = write_atomically(&mut reader, target).await?;
        debug!(object = %file, target = %target.display(), bytes = written, "object downloaded");
        Ok(target.to_path_buf())
    }

    async fn remove(&self, file: &FileHandle) -> StoreResult<()> {
        let path = self.path_of(file)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::from_fs(e, &path))?;
        debug!(object = %file, "object removed");
        Ok(())
    }

    async fn browse(&self, _file: &FileHandle, _opts: &BrowseOptions) -> StoreResult<String> {
        Err(StoreError::BrowseNotSupported)
    }
}

impl std::fmt::Debug for LocalShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalShardStore")
            .field("root", &self.settings.root)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
