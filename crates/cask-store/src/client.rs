//! Object-service client seam used by the remote backend.
//!
//! [`RemoteObjectStore`](crate::RemoteObjectStore) talks to its service only
//! through [`ObjectClient`], obtained from a [`ClientConnector`] at open time.
//! The S3 client and the in-memory client both sit behind this seam.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use cask_types::ByteRange;

use crate::error::StoreResult;
use crate::settings::RemoteSettings;
use crate::traits::FetchStream;

/// A single object write.
#[derive(Clone, Debug)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    /// Local file streamed as the request body.
    pub source: PathBuf,
    pub size: u64,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub expires: Option<SystemTime>,
}

/// Minimal bucket/object API of an S3-compatible service.
///
/// Missing objects surface as `StoreError::NotFound`; transport failures as
/// `StoreError::Io`.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    async fn create_bucket(&self, bucket: &str, region: Option<&str>) -> StoreResult<()>;

    async fn put_object(&self, request: PutObject) -> StoreResult<()>;

    /// Start a GET. The request is issued before this returns, so a missing
    /// object fails here rather than on the first read.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> StoreResult<FetchStream>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;
}

/// Builds a client from normalized settings.
pub trait ClientConnector: Send + Sync {
    fn connect(&self, settings: &RemoteSettings) -> StoreResult<Arc<dyn ObjectClient>>;
}
