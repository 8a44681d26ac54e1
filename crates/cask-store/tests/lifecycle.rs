use std::path::Path;
use std::sync::Arc;

use cask_store::{
    Connection, ConnectionState, DefaultIssuer, DriverRegistry, ErrorKind, InMemoryObjectClient,
    LocalShardStore, RemoteDriver, RemoteObjectStore, RemoteSettings, SettingsMap,
};
use cask_types::{FetchOptions, FileHandle, Health, UploadOptions};
use proptest::prelude::*;
use serde_json::json;

fn registry_with_memory(client: &InMemoryObjectClient) -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry
        .register(&["local"], Arc::new(cask_store::LocalDriver))
        .unwrap();
    registry
        .register(
            &["memory"],
            Arc::new(RemoteDriver::with_connector(Arc::new(client.clone()))),
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn state_machine_on_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let client = InMemoryObjectClient::new();
    let registry = registry_with_memory(&client);
    let mut local_settings = SettingsMap::new();
    local_settings.insert("path".into(), json!(dir.path().join("root").to_string_lossy()));

    let connections = [
        registry
            .connect("local", &local_settings, Arc::new(DefaultIssuer))
            .unwrap(),
        registry
            .connect("memory", &SettingsMap::new(), Arc::new(DefaultIssuer))
            .unwrap(),
    ];
    let handle = FileHandle::new("", "k", None, 0);

    for conn in &connections {
        // Closing an unopened connection changes nothing.
        conn.close().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Unopened);
        let err = conn.fetch(&handle, &FetchOptions::default()).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotConnected);

        conn.open().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
        let err = conn.fetch(&handle, &FetchOptions::default()).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }
}

#[tokio::test]
async fn health_is_readable_in_any_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalShardStore::at(dir.path());
    assert!(store.health().is_unchecked());

    store.record_health(Health::healthy(3, 1_700_000_000_000));
    assert_eq!(store.health().workload, 3);

    store.open().await.unwrap();
    store.close().await.unwrap();
    store.record_health(Health::unhealthy("disk full", 1_700_000_000_500));
    let health = store.health();
    assert!(!health.healthy);
    assert_eq!(health.message.as_deref(), Some("disk full"));
}

#[tokio::test]
async fn reopen_against_existing_bucket_does_not_recreate() {
    let client = InMemoryObjectClient::new().with_bucket("assets");
    let settings = RemoteSettings {
        bucket: "assets".into(),
        ..RemoteSettings::default()
    };
    let store = RemoteObjectStore::with_connector(settings, Arc::new(client.clone()));
    store.open().await.unwrap();
    assert_eq!(client.bucket_creations(), 0);
}

fn relative_path(root: &Path, full: &Path) -> String {
    full.strip_prefix(root)
        .unwrap()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn local_path_matches_remote_key(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        root in "[a-z]{0,6}",
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("input.dat");
            std::fs::write(&source, &data).unwrap();
            let store_root = dir.path().join("store");
            let local = LocalShardStore::at(&store_root);
            local.open().await.unwrap();

            let opts = UploadOptions::default().with_root(root.clone());
            let handle = local.upload(&source, &opts).await.unwrap();
            let stored = local.path_of(&handle).unwrap();
            let key = RemoteObjectStore::key_of(&handle).unwrap();
            assert_eq!(relative_path(&store_root, &stored), key);
        });
    }
}
