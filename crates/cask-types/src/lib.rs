//! Foundation types for cask content-addressed storage.
//!
//! Every other cask crate depends on `cask-types`.
//!
//! # Key Types
//!
//! - [`ContentDigest`] -- 256-bit content hash with url-safe and hex renderings
//! - [`FileHandle`] -- backend-independent identity of a stored object
//! - [`ObjectPath`] -- resolved backend-relative location of a handle
//! - [`Health`] -- connection health snapshot
//! - [`UploadOptions`], [`FetchOptions`], [`DownloadOptions`] -- per-operation options

pub mod digest;
pub mod error;
pub mod handle;
pub mod health;
pub mod options;
pub mod path;

pub use digest::ContentDigest;
pub use error::TypeError;
pub use handle::FileHandle;
pub use health::Health;
pub use options::{
    stringify_value, BrowseOptions, ByteRange, DownloadOptions, FetchOptions, UploadOptions,
};
pub use path::{shard_root, ObjectPath};
