use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use cask_types::{ByteRange, ObjectPath};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::FetchStream;

/// Native path of `object` under a local storage root.
pub(crate) fn native_path(root: &Path, object: &ObjectPath) -> PathBuf {
    object
        .segments()
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Stream `reader` into `target` through a sibling temp file.
///
/// Parent directories are created as needed. The temp file is renamed over
/// `target` only after every byte is written, so readers never observe a
/// partial object. Returns the number of bytes written.
pub(crate) async fn write_atomically<R>(reader: &mut R, target: &Path) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp = temp_sibling(target);

    let written = match copy_into(reader, &temp).await {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
    };
    if let Err(e) = fs::rename(&temp, target).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(written)
}

async fn copy_into<R>(reader: &mut R, temp: &Path) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = File::create(temp).await?;
    let written = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.part", uuid::Uuid::now_v7().simple()))
}

/// Open `path` for streamed reading, optionally restricted to `range`.
///
/// A range starting at or past the end of the file is rejected; an end past
/// the end of the file is clamped.
pub(crate) async fn open_range(path: &Path, range: Option<ByteRange>) -> StoreResult<FetchStream> {
    let meta = fs::metadata(path)
        .await
        .map_err(|e| StoreError::from_fs(e, path))?;
    if !meta.is_file() {
        return Err(StoreError::InvalidInput(format!(
            "{} is not a stored object",
            path.display()
        )));
    }
    let mut file = File::open(path)
        .await
        .map_err(|e| StoreError::from_fs(e, path))?;
    let Some(range) = range else {
        return Ok(Box::pin(file));
    };

    let size = meta.len();
    if range.start() >= size {
        return Err(StoreError::InvalidInput(format!(
            "range {} not satisfiable for {size} byte object",
            range.to_header()
        )));
    }
    file.seek(SeekFrom::Start(range.start())).await?;
    let stream: FetchStream = match range.byte_len() {
        Some(len) => Box::pin(file.take(len)),
        None => Box::pin(file),
    };
    Ok(stream)
}

/// Decide whether a download destination can be returned as-is.
///
/// A regular file whose length matches `expected_size` is trusted without
/// re-reading it. A length mismatch is logged and reported as a miss so the
/// caller re-fetches over it.
pub(crate) async fn cached_destination(target: &Path, expected_size: u64) -> StoreResult<bool> {
    match fs::metadata(target).await {
        Ok(meta) if meta.is_dir() => Err(StoreError::InvalidInput(format!(
            "download target {} is a directory",
            target.display()
        ))),
        Ok(meta) if meta.len() == expected_size => {
            debug!(target = %target.display(), "download target already present");
            Ok(true)
        }
        Ok(meta) => {
            warn!(
                target = %target.display(),
                found = meta.len(),
                expected = expected_size,
                "download target has unexpected size; fetching again"
            );
            Ok(false)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Reject an empty download target.
pub(crate) fn require_target(target: &Path) -> StoreResult<&Path> {
    if target.as_os_str().is_empty() {
        return Err(StoreError::InvalidInput("download target is empty".into()));
    }
    Ok(target)
}
