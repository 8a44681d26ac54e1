//! Pluggable content-addressed object storage for cask.
//!
//! Callers depend on the [`Connection`] trait; concrete backends are picked
//! by name from a [`DriverRegistry`] the host builds at startup.
//!
//! # Storage Backends
//!
//! - [`LocalShardStore`] -- files under a local root, sharded two levels
//!   deep by digest prefix
//! - [`RemoteObjectStore`] -- objects in an S3-compatible bucket, reached
//!   through an [`ObjectClient`] ([`S3Client`] with the `s3` feature, or
//!   [`InMemoryObjectClient`] for tests and embedding)
//!
//! # Rules
//!
//! 1. An upload without an explicit key lands at
//!    `{root}/{hex[0..2]}/{hex[2..4]}/{url_safe_digest}[.{ext}]` on every
//!    backend.
//! 2. Data operations require an open connection.
//! 3. Every I/O failure is returned; nothing is retried.

pub mod client;
pub mod error;
mod fsutil;
pub mod issuer;
pub mod lifecycle;
pub mod local;
pub mod memory;
pub mod registry;
pub mod remote;
mod resolver;
#[cfg(feature = "s3")]
pub mod s3;
pub mod settings;
pub mod traits;

pub use client::{ClientConnector, ObjectClient, PutObject};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use issuer::{DefaultIssuer, HandleIssuer};
pub use lifecycle::ConnectionState;
pub use local::LocalShardStore;
pub use memory::{InMemoryObjectClient, MemoryObject};
pub use registry::{Driver, DriverRegistry, LocalDriver, RemoteDriver};
pub use remote::RemoteObjectStore;
#[cfg(feature = "s3")]
pub use s3::{S3Client, S3Connector};
pub use settings::{LocalSettings, RemoteSettings, SettingsMap};
pub use traits::{Connection, FetchStream};
