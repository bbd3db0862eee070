//! Backend-agnostic file storage with optional transparent encryption.
//!
//! This crate provides the [`FilesStore`] contract — uniform CRUD over
//! files identified by logical slash-separated paths — and two backends
//! that implement it:
//!
//! - [`LocalFilesStore`]: files under a configured root directory
//! - [`ObjectFilesStore`]: files in an S3-compatible bucket, reached
//!   through an injected [`ObjectClient`] transport
//!
//! Both backends optionally hold an encryption key. When one is configured,
//! content is passed through the `cask-codec` stream transform on write and
//! read; everything a caller sees (paths, sizes) stays in plaintext terms.
//! [`MemoryObjectClient`] is an in-process transport for tests and local
//! development, and [`FileChecker`] validates aggregate upload sizes before
//! anything is persisted.
//!
//! # Design
//!
//! - Composition over inheritance: a backend is a transport plus an
//!   optional codec, nothing is shared beyond the trait
//! - Last-write-wins: writes overwrite silently
//! - No internal retries: transient backend faults surface as
//!   [`StoreError::Transport`] for the caller to retry

mod check;
mod local;
mod memory;
mod object;
mod store;

pub use check::{FileChecker, DEFAULT_MAX_UPLOAD_SIZE};
pub use local::LocalFilesStore;
pub use memory::MemoryObjectClient;
pub use object::{ObjectClient, ObjectEntry, ObjectFilesStore, ObjectPage, ObjectStoreConfig};
pub use store::{FileRefIter, FilesStore, Upload};

/// Errors raised by the underlying transport (filesystem or object
/// storage).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The backend has no object at the requested key
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// Filesystem-level failure (disk full, permission denied, ...)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Object-storage backend failure (network error, service fault, ...)
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No file exists at the given logical path
    #[error("file not found: {0}")]
    NotFound(String),

    /// The logical path is malformed or attempts traversal
    #[error(transparent)]
    InvalidPath(#[from] cask_types::PathError),

    /// Aggregate upload size exceeds the configured ceiling
    #[error("payload of {total} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { total: u64, limit: u64 },

    /// The backend I/O failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encryption codec failure outside a content stream, e.g. a stored
    /// ciphertext whose size no valid stream could produce
    #[error(transparent)]
    Codec(#[from] cask_codec::CodecError),
}

/// Convenience alias for store operation results.
pub type StoreResult<T> = Result<T, StoreError>;
