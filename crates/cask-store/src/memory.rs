use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use cask_types::ByteRange;

use crate::client::{ClientConnector, ObjectClient, PutObject};
use crate::error::{StoreError, StoreResult};
use crate::settings::RemoteSettings;
use crate::traits::FetchStream;

/// An object held by [`InMemoryObjectClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub expires: Option<SystemTime>,
}

#[derive(Default)]
struct State {
    buckets: BTreeSet<String>,
    objects: HashMap<(String, String), MemoryObject>,
    put_count: usize,
    bucket_creations: usize,
    unreachable: bool,
}

/// In-memory object service for tests and embedding.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// store owns another through [`ClientConnector`].
#[derive(Clone, Default)]
pub struct InMemoryObjectClient {
    state: Arc<RwLock<State>>,
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that refuses every request with a transport error.
    pub fn unreachable() -> Self {
        let client = Self::new();
        client.write().unreachable = true;
        client
    }

    /// Pre-create `bucket`, as if provisioned out of band.
    pub fn with_bucket(self, bucket: impl Into<String>) -> Self {
        self.write().buckets.insert(bucket.into());
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<MemoryObject> {
        self.read()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .read()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.read().buckets.contains(bucket)
    }

    /// Number of successful `put_object` calls.
    pub fn put_count(&self) -> usize {
        self.read().put_count
    }

    /// Number of successful `create_bucket` calls.
    pub fn bucket_creations(&self) -> usize {
        self.read().bucket_creations
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.read().unreachable {
            return Err(StoreError::transport("object service unreachable"));
        }
        Ok(())
    }

    fn check_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.has_bucket(bucket) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("bucket {bucket}")))
        }
    }
}

#[async_trait]
impl ObjectClient for InMemoryObjectClient {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        self.check_reachable()?;
        Ok(self.has_bucket(bucket))
    }

    async fn create_bucket(&self, bucket: &str, _region: Option<&str>) -> StoreResult<()> {
        self.check_reachable()?;
        let mut state = self.write();
        if !state.buckets.insert(bucket.to_string()) {
            return Err(StoreError::InvalidInput(format!("bucket {bucket} already exists")));
        }
        state.bucket_creations += 1;
        Ok(())
    }

    async fn put_object(&self, request: PutObject) -> StoreResult<()> {
        self.check_reachable()?;
        self.check_bucket(&request.bucket)?;
        let data = tokio::fs::read(&request.source).await?;
        let object = MemoryObject {
            data,
            content_type: request.content_type,
            metadata: request.metadata,
            tags: request.tags,
            expires: request.expires,
        };
        let mut state = self.write();
        state.objects.insert((request.bucket, request.key), object);
        state.put_count += 1;
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> StoreResult<FetchStream> {
        self.check_reachable()?;
        self.check_bucket(bucket)?;
        let data = self
            .object(bucket, key)
            .map(|o| o.data)
            .ok_or_else(|| StoreError::NotFound(format!("{bucket}/{key}")))?;
        let slice = match range {
            None => data,
            Some(range) => {
                let size = data.len() as u64;
                if range.start() >= size {
                    return Err(StoreError::InvalidInput(format!(
                        "range {} not satisfiable for {size} byte object",
                        range.to_header()
                    )));
                }
                let end = range.end().map_or(size, |e| e.saturating_add(1).min(size));
                data[range.start() as usize..end as usize].to_vec()
            }
        };
        Ok(Box::pin(Cursor::new(slice)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.check_reachable()?;
        self.check_bucket(bucket)?;
        self.write()
            .objects
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

impl ClientConnector for InMemoryObjectClient {
    fn connect(&self, _settings: &RemoteSettings) -> StoreResult<Arc<dyn ObjectClient>> {
        Ok(Arc::new(self.clone()))
    }
}

impl std::fmt::Debug for InMemoryObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("InMemoryObjectClient")
            .field("buckets", &state.buckets)
            .field("object_count", &state.objects.len())
            .finish()
    }
}
