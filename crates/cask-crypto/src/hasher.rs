use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use cask_types::ContentDigest;

/// Read size used when streaming file contents into the digest.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Domain-separated, streaming BLAKE3 content hasher.
///
/// Each hasher carries a versioned domain tag that is fed to the digest
/// before any content. Changing the scheme means introducing a new tag, so
/// digests minted under different schemes can never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored file contents.
    pub const FILE: Self = Self {
        domain: "cask-file-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash an in-memory buffer.
    pub fn hash(&self, data: &[u8]) -> ContentDigest {
        let mut hasher = self.start();
        hasher.update(data);
        ContentDigest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash everything `reader` yields, [`CHUNK_SIZE`] bytes at a time.
    ///
    /// Memory use is bounded by the chunk size regardless of input length.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<ContentDigest> {
        let mut hasher = self.start();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(ContentDigest::from_hash(*hasher.finalize().as_bytes()))
    }

    /// Stream the file at `path` through the digest.
    pub fn hash_file(&self, path: &Path) -> Result<ContentDigest, HasherError> {
        let file = File::open(path).map_err(|source| HasherError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.hash_reader(file).map_err(|source| HasherError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &ContentDigest) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error)]
pub enum HasherError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
