use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use cask_types::{BrowseOptions, DownloadOptions, FetchOptions, FileHandle, Health, UploadOptions};
use tokio::io::AsyncRead;

use crate::error::StoreResult;
use crate::lifecycle::ConnectionState;

/// Readable byte stream returned by `fetch`. Dropping it releases the
/// underlying file or network body.
pub type FetchStream = Pin<Box<dyn AsyncRead + Send>>;

/// A connection to one configured storage backend.
///
/// All implementations must satisfy these invariants:
/// - Lifecycle is `Unopened -> Open -> Closed`. Data operations outside the
///   `Open` state fail with `StoreError::NotConnected`.
/// - `close` is idempotent and safe on a connection that was never opened.
/// - `health` never blocks on I/O.
/// - Uploads without an explicit key resolve to the same object path on
///   every backend for the same content.
/// - Every I/O failure is returned to the caller; nothing is retried.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Registered name of the driver that produced this connection.
    fn driver(&self) -> &'static str;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Establish the session and make sure the storage root or bucket exists.
    async fn open(&self) -> StoreResult<()>;

    /// Last recorded health snapshot.
    fn health(&self) -> Health;

    /// Replace the health snapshot. Called by external health checkers.
    fn record_health(&self, health: Health);

    /// Release backend resources.
    async fn close(&self) -> StoreResult<()>;

    /// Store the file at `source` and return its handle.
    ///
    /// Directories are rejected with `StoreError::InvalidInput`.
    async fn upload(&self, source: &Path, opts: &UploadOptions) -> StoreResult<FileHandle>;

    /// Open the object behind `file` for streamed reading.
    async fn fetch(&self, file: &FileHandle, opts: &FetchOptions) -> StoreResult<FetchStream>;

    /// Copy the object behind `file` to `opts.target` and return that path.
    ///
    /// A destination that already holds a file of the recorded size is
    /// returned without transferring anything.
    async fn download(&self, file: &FileHandle, opts: &DownloadOptions) -> StoreResult<PathBuf>;

    /// Permanently delete the object behind `file`.
    async fn remove(&self, file: &FileHandle) -> StoreResult<()>;

    /// Produce a browsable URL for `file`.
    async fn browse(&self, file: &FileHandle, opts: &BrowseOptions) -> StoreResult<String>;
}
