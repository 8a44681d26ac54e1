use std::path::Path;

use cask_crypto::{ContentHasher, HasherError};
use cask_types::{ContentDigest, FileHandle};

/// The file-metadata service that mints handles for uploaded content.
///
/// Hosts that track files in their own catalog implement this to hand out
/// their handles (and optionally their own hashing); everyone else uses
/// [`DefaultIssuer`].
pub trait HandleIssuer: Send + Sync {
    /// Mint a handle for an object about to be stored.
    ///
    /// Returning `None` aborts the upload with `StoreError::InvalidInput`.
    fn issue(
        &self,
        root: &str,
        key: &str,
        extension: Option<&str>,
        size: u64,
        hash: Option<&ContentDigest>,
    ) -> Option<FileHandle>;

    /// Digest the file at `path`. Runs on a blocking thread.
    fn hash(&self, path: &Path) -> Result<ContentDigest, HasherError> {
        ContentHasher::FILE.hash_file(path)
    }
}

/// Issuer that mints plain handles and hashes with [`ContentHasher::FILE`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultIssuer;

impl HandleIssuer for DefaultIssuer {
    fn issue(
        &self,
        root: &str,
        key: &str,
        extension: Option<&str>,
        size: u64,
        hash: Option<&ContentDigest>,
    ) -> Option<FileHandle> {
        let handle = FileHandle::new(root, key, extension.map(str::to_string), size);
        Some(match hash {
            Some(digest) => handle.with_hash(*digest),
            None => handle,
        })
    }
}
