//! Backend-relative object paths.
//!
//! Paths are always `/`-separated regardless of platform so the same handle
//! resolves to the same string on the local and the remote backend. Local
//! backends convert to a native path only at the filesystem boundary.

use std::fmt;

use crate::digest::ContentDigest;
use crate::error::TypeError;
use crate::handle::FileHandle;

/// The resolved location of an object, relative to a backend's storage root
/// or bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    directory: String,
    object: String,
}

impl ObjectPath {
    /// Resolve the location of `handle`.
    ///
    /// The object name is `key`, suffixed with `.extension` when the handle
    /// carries one, placed under `root`. No sharding happens here: a handle
    /// already carries its resolved root.
    pub fn resolve(handle: &FileHandle) -> Result<Self, TypeError> {
        let name = match handle.extension() {
            Some(ext) => format!("{}.{}", handle.key(), ext),
            None => handle.key().to_string(),
        };
        if handle.key().trim_matches('/').is_empty() {
            return Err(TypeError::InvalidPath {
                path: name,
                reason: "empty key",
            });
        }

        let object = join(&[handle.root(), &name])?;
        let directory = match object.rfind('/') {
            Some(idx) => object[..idx].to_string(),
            None => String::new(),
        };
        Ok(Self { directory, object })
    }

    /// Parent directory of the object; empty when the object sits at the top
    /// level.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Full object path, usable as an object-store key.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Individual path segments of the object path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.object.split('/')
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object)
    }
}

/// Nest the two hex shard directories of `digest` under `root`.
///
/// `shard_root("media", d)` yields `media/ab/cd` where `abcd` are the first
/// four hex characters of `d`; an empty root yields `ab/cd`.
pub fn shard_root(root: &str, digest: &ContentDigest) -> Result<String, TypeError> {
    let [first, second] = digest.shard_segments();
    join(&[root, &first, &second])
}

/// Join `/`-separated parts, dropping empty and `.` segments.
///
/// `..` is rejected so a resolved path can never climb out of the storage
/// root it is later joined onto.
pub fn join(parts: &[&str]) -> Result<String, TypeError> {
    let mut out: Vec<&str> = Vec::new();
    for part in parts {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(TypeError::InvalidPath {
                        path: parts.join("/"),
                        reason: "parent directory segment",
                    })
                }
                s if s.contains('\\') || s.contains('\0') => {
                    return Err(TypeError::InvalidPath {
                        path: parts.join("/"),
                        reason: "illegal character in segment",
                    })
                }
                s => out.push(s),
            }
        }
    }
    Ok(out.join("/"))
}
