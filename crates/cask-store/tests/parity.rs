//! Behavior shared by every backend, checked against the local shard store
//! and the remote store over an in-memory object service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cask_crypto::ContentHasher;
use cask_store::{
    Connection, ErrorKind, InMemoryObjectClient, LocalShardStore, RemoteObjectStore,
    RemoteSettings,
};
use cask_types::{
    BrowseOptions, DownloadOptions, FetchOptions, FileHandle, Health, UploadOptions,
};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

struct Backends {
    _dir: TempDir,
    scratch: PathBuf,
    local: LocalShardStore,
    remote: RemoteObjectStore,
}

async fn backends() -> Backends {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    std::fs::create_dir_all(&scratch).unwrap();

    let local = LocalShardStore::at(dir.path().join("store"));
    local.open().await.unwrap();
    let remote = RemoteObjectStore::with_connector(
        RemoteSettings::default(),
        Arc::new(InMemoryObjectClient::new()),
    );
    remote.open().await.unwrap();

    Backends {
        _dir: dir,
        scratch,
        local,
        remote,
    }
}

impl Backends {
    fn all(&self) -> [&dyn Connection; 2] {
        [&self.local, &self.remote]
    }

    fn write(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.scratch.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }
}

async fn fetch_all(conn: &dyn Connection, handle: &FileHandle) -> Vec<u8> {
    let mut out = Vec::new();
    conn.fetch(handle, &FetchOptions::default())
        .await
        .unwrap()
        .read_to_end(&mut out)
        .await
        .unwrap();
    out
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[tokio::test]
async fn same_content_same_path_on_every_backend() {
    let b = backends().await;
    let source = b.write("photo.png", b"identical bytes");
    let opts = UploadOptions::default().with_root("media");

    let local = b.local.upload(&source, &opts).await.unwrap();
    let remote = b.remote.upload(&source, &opts).await.unwrap();
    assert_eq!(local, remote);
    assert_eq!(local.code().unwrap(), remote.code().unwrap());
    assert!(local.code().unwrap().starts_with("media/"));
    assert!(local.code().unwrap().ends_with(".png"));
}

#[tokio::test]
async fn round_trip_across_sizes() {
    let b = backends().await;
    for len in [0usize, 1, 64 * 1024 + 17, 300 * 1024] {
        let data = pattern(len);
        let source = b.write(&format!("in-{len}.bin"), &data);
        for (i, conn) in b.all().into_iter().enumerate() {
            let handle = conn.upload(&source, &UploadOptions::default()).await.unwrap();
            assert_eq!(handle.size(), len as u64);

            let target = b.scratch.join(format!("out-{len}-{i}.bin"));
            let got = conn
                .download(&handle, &DownloadOptions::to(&target))
                .await
                .unwrap();
            assert_eq!(std::fs::read(got).unwrap(), data, "{} at {len} bytes", conn.driver());
            assert_eq!(fetch_all(conn, &handle).await, data);
        }
    }
}

#[tokio::test]
async fn browse_always_fails() {
    let b = backends().await;
    let source = b.write("page.html", b"<html/>");
    for conn in b.all() {
        let handle = conn.upload(&source, &UploadOptions::default()).await.unwrap();
        for h in [handle, FileHandle::new("", "never-stored", None, 0)] {
            let err = conn.browse(&h, &BrowseOptions::default()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BrowseNotSupported);
        }
    }
}

#[tokio::test]
async fn remove_then_fetch_is_not_found() {
    let b = backends().await;
    let source = b.write("temp.log", b"ephemeral");
    for conn in b.all() {
        let handle = conn.upload(&source, &UploadOptions::default()).await.unwrap();
        conn.remove(&handle).await.unwrap();
        let err = conn
            .fetch(&handle, &FetchOptions::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{}", conn.driver());
    }
}

#[tokio::test]
async fn directory_upload_is_invalid_input() {
    let b = backends().await;
    for conn in b.all() {
        let err = conn
            .upload(&b.scratch, &UploadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", conn.driver());
    }
}

#[tokio::test]
async fn local_upload_writes_once() {
    let b = backends().await;
    let source = b.write("once.txt", b"write me once");
    let first = b.local.upload(&source, &UploadOptions::default()).await.unwrap();
    let stored = b.local.path_of(&first).unwrap();
    // A second physical write would restore the original bytes.
    std::fs::write(&stored, b"tampered").unwrap();

    let second = b.local.upload(&source, &UploadOptions::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read(&stored).unwrap(), b"tampered");
}

#[test]
fn shard_leaves_stay_small() {
    let mut leaves: HashMap<String, usize> = HashMap::new();
    for i in 0u64..10_000 {
        let digest = ContentHasher::FILE.hash(&i.to_le_bytes());
        let [a, b] = digest.shard_segments();
        *leaves.entry(format!("{a}/{b}")).or_default() += 1;
    }
    // 10_000 / 65_536 is about 0.15 per leaf in expectation.
    let max = leaves.values().copied().max().unwrap_or(0);
    assert!(max <= 8, "busiest shard leaf holds {max} entries");
}

fn stored_file_count(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

#[tokio::test]
async fn distinct_content_distinct_objects() {
    let b = backends().await;
    for i in 0..20u32 {
        let source = b.write(&format!("n{i}"), &i.to_be_bytes());
        b.local.upload(&source, &UploadOptions::default()).await.unwrap();
    }
    let root = b.local.settings().root.clone();
    assert_eq!(stored_file_count(&root), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_of_one_source_settle_on_one_object() {
    let b = backends().await;
    let data = pattern(256 * 1024 + 3);
    let source = b.write("shared.bin", &data);
    let store = Arc::new(LocalShardStore::at(b.scratch.with_file_name("shared")));
    store.open().await.unwrap();

    let expected = b.local.upload(&source, &UploadOptions::default()).await.unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let handle = expected.clone();
            tokio::spawn(async move {
                loop {
                    match store.fetch(&handle, &FetchOptions::default()).await {
                        Ok(mut stream) => {
                            let mut out = Vec::new();
                            stream.read_to_end(&mut out).await.unwrap();
                            return out;
                        }
                        Err(e) if e.kind() == ErrorKind::NotFound => {
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                        Err(e) => panic!("fetch during uploads failed: {e}"),
                    }
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let source = source.clone();
            tokio::spawn(async move { store.upload(&source, &UploadOptions::default()).await })
        })
        .collect();

    for writer in writers {
        assert_eq!(writer.await.unwrap().unwrap(), expected);
    }
    for reader in readers {
        assert_eq!(reader.await.unwrap(), data);
    }
    assert_eq!(fetch_all(store.as_ref(), &expected).await, data);

    let root = store.settings().root.clone();
    let leftovers: Vec<_> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    assert_eq!(stored_file_count(&root), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn health_snapshots_are_never_torn() {
    let b = backends().await;
    let store = Arc::new(LocalShardStore::at(b.local.settings().root.clone()));
    store.open().await.unwrap();
    let tasks: Vec<_> = (1..=16u64)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..100 {
                    store.record_health(Health::healthy(i, i));
                    let seen = store.health();
                    assert!(seen.healthy);
                    assert_eq!(seen.checked_at_ms, Some(seen.workload));
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    let last = store.health();
    assert!((1..=16).contains(&last.workload));
}
