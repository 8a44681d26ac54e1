use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::TypeError;
use crate::path::ObjectPath;

/// Identity of a stored object, independent of the backend holding it.
///
/// Handles are minted once at upload time and never mutated afterwards.
/// Two handles with equal `root`, `key` and `extension` resolve to the same
/// backend path, which is what makes content-addressed uploads idempotent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle {
    /// Content digest; absent when the caller supplied an explicit key.
    hash: Option<ContentDigest>,
    /// Addressable object name (the url-safe digest unless overridden).
    key: String,
    /// Extension appended to the stored object name, without the dot.
    extension: Option<String>,
    /// Namespace prefix, already including any shard directories.
    root: String,
    /// Byte length recorded at creation.
    size: u64,
}

impl FileHandle {
    /// Create a handle from its resolved parts.
    ///
    /// An empty extension is treated as no extension.
    pub fn new(
        root: impl Into<String>,
        key: impl Into<String>,
        extension: Option<String>,
        size: u64,
    ) -> Self {
        Self {
            hash: None,
            key: key.into(),
            extension: extension.filter(|e| !e.is_empty()),
            root: root.into(),
            size,
        }
    }

    /// Attach the content digest this handle was derived from.
    pub fn with_hash(mut self, hash: ContentDigest) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn hash(&self) -> Option<&ContentDigest> {
        self.hash.as_ref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Resolve the backend-relative path of this handle.
    pub fn object_path(&self) -> Result<ObjectPath, TypeError> {
        ObjectPath::resolve(self)
    }

    /// Opaque identity string: the resolved object path.
    pub fn code(&self) -> Result<String, TypeError> {
        Ok(self.object_path()?.object().to_string())
    }

    /// Rebuild a handle from a [`code`](Self::code).
    ///
    /// The last path segment is split into key and extension at its final
    /// `.`. When the key decodes as a url-safe digest the hash is restored.
    pub fn from_code(code: &str, size: u64) -> Result<Self, TypeError> {
        let code = crate::path::join(&[code])?;
        let (root, name) = match code.rsplit_once('/') {
            Some((root, name)) => (root, name),
            None => ("", code.as_str()),
        };
        let (key, extension) = match name.rsplit_once('.') {
            Some((key, ext)) if !key.is_empty() => (key, Some(ext.to_string())),
            _ => (name, None),
        };
        if key.is_empty() {
            return Err(TypeError::InvalidPath {
                path: code.clone(),
                reason: "empty key",
            });
        }

        let handle = Self::new(root, key, extension, size);
        Ok(match ContentDigest::from_url_safe(key) {
            Ok(digest) => handle.with_hash(digest),
            Err(_) => handle,
        })
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object_path() {
            Ok(path) => write!(f, "{path}"),
            Err(_) => write!(f, "{}/{}", self.root, self.key),
        }
    }
}
