//! Upload path planning shared by every backend.
//!
//! Without an explicit key the source is digested, two hex shard directories
//! are nested under the requested root, and the url-safe digest becomes the
//! key. With an explicit key the object is addressed directly by it.

use std::path::Path;
use std::sync::Arc;

use cask_types::{path, shard_root, ContentDigest, FileHandle, ObjectPath, UploadOptions};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::issuer::HandleIssuer;

/// A minted handle together with the path it resolves to.
#[derive(Clone, Debug)]
pub(crate) struct UploadPlan {
    pub handle: FileHandle,
    pub path: ObjectPath,
}

/// Resolve where `source` will be stored.
///
/// Only the source metadata is read before directories are rejected; the
/// file contents are read only for hashing.
pub(crate) async fn plan_upload(
    source: &Path,
    opts: &UploadOptions,
    issuer: &Arc<dyn HandleIssuer>,
) -> StoreResult<UploadPlan> {
    let meta = tokio::fs::metadata(source).await?;
    if meta.is_dir() {
        return Err(StoreError::InvalidInput(format!(
            "{} is a directory; directory upload is not supported",
            source.display()
        )));
    }

    let extension = source_extension(source);
    let requested_root = opts.root.as_deref().unwrap_or("");

    let (root, key, digest) = match opts.explicit_key() {
        Some(key) => (path::join(&[requested_root])?, key.to_string(), None),
        None => {
            let digest = hash_source(issuer, source).await?;
            let root = shard_root(requested_root, &digest)?;
            (root, digest.to_url_safe(), Some(digest))
        }
    };

    let handle = issuer
        .issue(&root, &key, extension.as_deref(), meta.len(), digest.as_ref())
        .ok_or_else(|| {
            StoreError::InvalidInput(format!("no file handle issued for {}", source.display()))
        })?;
    let path = handle.object_path()?;
    debug!(source = %source.display(), object = %path, "planned upload");
    Ok(UploadPlan { handle, path })
}

async fn hash_source(
    issuer: &Arc<dyn HandleIssuer>,
    source: &Path,
) -> StoreResult<ContentDigest> {
    let issuer = Arc::clone(issuer);
    let owned = source.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || issuer.hash(&owned))
        .await
        .map_err(|e| StoreError::Hash {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })??;
    Ok(digest)
}

/// Extension of the source file name, without the dot.
///
/// A non-UTF-8 extension cannot be carried in a handle and is dropped.
fn source_extension(source: &Path) -> Option<String> {
    let ext = source.extension()?;
    match ext.to_str() {
        Some(ext) if !ext.is_empty() => Some(ext.to_string()),
        Some(_) => None,
        None => {
            debug!(source = %source.display(), "dropping non-UTF-8 extension");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::issuer::DefaultIssuer;
    use cask_crypto::ContentHasher;

    fn issuer() -> Arc<dyn HandleIssuer> {
        Arc::new(DefaultIssuer)
    }

    #[tokio::test]
    async fn content_addressed_plan() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.jpg");
        std::fs::write(&source, b"pixels").unwrap();

        let plan = plan_upload(&source, &UploadOptions::default(), &issuer())
            .await
            .unwrap();
        let digest = ContentHasher::FILE.hash(b"pixels");
        let hex = digest.to_hex();
        assert_eq!(
            plan.path.object(),
            format!("{}/{}/{}.jpg", &hex[0..2], &hex[2..4], digest.to_url_safe())
        );
        assert_eq!(plan.handle.hash(), Some(&digest));
        assert_eq!(plan.handle.size(), 6);
    }

    #[tokio::test]
    async fn root_goes_above_shards() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("blob");
        std::fs::write(&source, b"data").unwrap();

        let opts = UploadOptions::default().with_root("tenant-a");
        let plan = plan_upload(&source, &opts, &issuer()).await.unwrap();
        let segments: Vec<_> = plan.path.segments().collect();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], "tenant-a");
        assert_eq!(plan.handle.extension(), None);
    }

    #[tokio::test]
    async fn explicit_key_skips_sharding() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.pdf");
        std::fs::write(&source, b"%PDF").unwrap();

        let opts = UploadOptions::default()
            .with_root("docs")
            .with_key("2024/q1");
        let plan = plan_upload(&source, &opts, &issuer()).await.unwrap();
        assert_eq!(plan.path.object(), "docs/2024/q1.pdf");
        assert!(plan.handle.hash().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_extension_is_dropped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join(OsStr::from_bytes(b"scan.\xff\xfe"));
        std::fs::write(&source, b"raw").unwrap();

        let plan = plan_upload(&source, &UploadOptions::default(), &issuer())
            .await
            .unwrap();
        assert_eq!(plan.handle.extension(), None);
        assert!(!plan.path.object().contains('\u{fffd}'));
    }

    #[test]
    fn extension_is_taken_verbatim() {
        assert_eq!(source_extension(Path::new("a/b.tar.gz")).as_deref(), Some("gz"));
        assert_eq!(source_extension(Path::new("README")), None);
        assert_eq!(source_extension(Path::new("trailing.")), None);
    }

    #[tokio::test]
    async fn directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = plan_upload(dir.path(), &UploadOptions::default(), &issuer())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn missing_source_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = plan_upload(&dir.path().join("nope"), &UploadOptions::default(), &issuer())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    struct RefusingIssuer;

    impl HandleIssuer for RefusingIssuer {
        fn issue(
            &self,
            _root: &str,
            _key: &str,
            _extension: Option<&str>,
            _size: u64,
            _hash: Option<&ContentDigest>,
        ) -> Option<FileHandle> {
            None
        }
    }

    #[tokio::test]
    async fn refused_handle_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        std::fs::write(&source, b"a").unwrap();
        let issuer: Arc<dyn HandleIssuer> = Arc::new(RefusingIssuer);
        let err = plan_upload(&source, &UploadOptions::default(), &issuer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
