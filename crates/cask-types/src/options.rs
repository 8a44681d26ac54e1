use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Options accepted by `upload`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UploadOptions {
    /// Explicit object key. When set, content hashing and sharding are
    /// skipped and the caller owns collision avoidance.
    pub key: Option<String>,
    /// Namespace prefix placed above the shard directories.
    pub root: Option<String>,
    /// Content type passed to object stores that record one.
    pub mimetype: Option<String>,
    /// User metadata; values are stringified before they reach the store.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Object tags; values are stringified before they reach the store.
    pub tags: BTreeMap<String, serde_json::Value>,
    /// Cache expiry recorded on the stored object.
    pub expires: Option<SystemTime>,
}

impl UploadOptions {
    /// Upload under an explicit key instead of the content digest.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(name.into(), value);
        self
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.tags.insert(name.into(), value);
        self
    }

    pub fn with_expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    /// The explicit key, if one was given and is non-empty.
    pub fn explicit_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// Metadata with every value rendered as a string.
    pub fn metadata_strings(&self) -> BTreeMap<String, String> {
        stringify_map(&self.metadata)
    }

    /// Tags with every value rendered as a string.
    pub fn tag_strings(&self) -> BTreeMap<String, String> {
        stringify_map(&self.tags)
    }
}

/// Render a JSON value the way it should appear in object metadata:
/// strings verbatim, everything else as its JSON text.
pub fn stringify_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stringify_map(map: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), stringify_value(v)))
        .collect()
}

/// Inclusive byte range, as in an HTTP `Range: bytes=start-end` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    start: u64,
    end: Option<u64>,
}

impl ByteRange {
    /// Range covering `start..=end`.
    pub fn new(start: u64, end: u64) -> Result<Self, TypeError> {
        if end < start {
            return Err(TypeError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Range from `start` to the end of the object.
    pub fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Inclusive last byte, or `None` for open-ended ranges.
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Number of bytes covered, or `None` for open-ended ranges.
    pub fn byte_len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }

    /// Value for an HTTP `Range` header.
    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Options accepted by `fetch`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Restrict the read to part of the object.
    pub range: Option<ByteRange>,
}

impl FetchOptions {
    pub fn range(range: ByteRange) -> Self {
        Self { range: Some(range) }
    }
}

/// Options accepted by `download`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Local destination file. Must be non-empty.
    pub target: PathBuf,
}

impl DownloadOptions {
    pub fn to(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

/// Options accepted by `browse`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrowseOptions {
    /// Requested lifetime of a browse URL, for backends that could mint one.
    pub expires_in_secs: Option<u64>,
}
