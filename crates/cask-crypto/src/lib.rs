//! Content addressing for cask.
//!
//! Provides a streaming, domain-separated BLAKE3 hasher. Files are read in
//! fixed-size chunks so arbitrarily large inputs hash in constant memory.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError, CHUNK_SIZE};
