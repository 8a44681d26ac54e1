use std::io;
use std::path::{Path, PathBuf};

use cask_crypto::HasherError;
use cask_types::TypeError;

/// Errors from storage driver operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Opening the connection failed (handshake, auth, bucket setup).
    #[error("connection error: {0}")]
    Connection(String),

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Local read/write failure or network transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The caller passed something the operation cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend has no browse capability.
    #[error("store browse not supported")]
    BrowseNotSupported,

    /// Content addressing could not produce a digest.
    #[error("cannot hash {}: {reason}", path.display())]
    Hash { path: PathBuf, reason: String },

    /// A data operation was attempted on a connection that is not open.
    #[error("connection is not open")]
    NotConnected,
}

/// Fieldless view of [`StoreError`] for matching on the error class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    NotFound,
    Io,
    InvalidInput,
    BrowseNotSupported,
    Hash,
    NotConnected,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::BrowseNotSupported => ErrorKind::BrowseNotSupported,
            Self::Hash { .. } => ErrorKind::Hash,
            Self::NotConnected => ErrorKind::NotConnected,
        }
    }

    /// Wrap a network or client failure as an I/O error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Io(io::Error::other(message.into()))
    }

    /// Re-classify any failure during `open` as a connection error.
    pub(crate) fn into_connection(self) -> Self {
        match self {
            Self::Connection(_) => self,
            other => Self::Connection(other.to_string()),
        }
    }

    /// Map a filesystem error on `path`, turning a missing file into
    /// [`StoreError::NotFound`].
    pub(crate) fn from_fs(err: io::Error, path: &Path) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.display().to_string())
        } else {
            Self::Io(err)
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<HasherError> for StoreError {
    fn from(err: HasherError) -> Self {
        match err {
            HasherError::Read { path, source } => Self::Hash {
                path,
                reason: source.to_string(),
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
