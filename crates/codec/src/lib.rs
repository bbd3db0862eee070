//! Chunk-framed streaming authenticated encryption.
//!
//! This crate turns a plaintext byte stream into a framed AES-256-GCM
//! ciphertext stream and back, without ever holding more than one chunk in
//! memory. It knows nothing about file paths or storage backends; both
//! directions are plain [`std::io::Read`] adapters.
//!
//! # Wire format
//!
//! Plaintext is consumed in chunks of [`CHUNK_SIZE`] bytes. Each chunk is
//! sealed with a fresh random 96-bit nonce and written as one
//! self-delimiting frame:
//!
//! ```text
//! - frame length (32 bits, little endian) - length of nonce + ciphertext
//! - nonce (96 bits)                       - random, unique per chunk
//! - ciphertext                            - chunk + 16-byte GCM tag
//! ```
//!
//! Every frame authenticates independently, so decryption verifies each
//! chunk before yielding its plaintext and fails fast on tampering or a
//! wrong key. Because the per-frame overhead is fixed, the logical
//! (plaintext) size of a stored ciphertext can be recovered arithmetically
//! with [`plaintext_len`] without reading the stream.
//!
//! Chunking trades a 32-byte overhead per chunk for bounded memory use;
//! the frame layout is not compatible with any other tool's format.

mod key;
mod stream;

pub use key::EncryptionKey;
pub use stream::{plaintext_len, DecryptingReader, EncryptingReader, CHUNK_SIZE, FRAME_OVERHEAD};

/// Errors raised by the encryption codec.
///
/// Errors produced while a reader is being consumed are wrapped in an
/// [`std::io::Error`] of kind `InvalidData` (they come out of
/// [`std::io::Read::read`]); use [`CodecError::from_io`] to recover the
/// typed error. Key material never appears in any message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A frame failed authentication: wrong key, or corrupted/tampered data
    #[error("integrity check failed at chunk {chunk}")]
    Integrity { chunk: u64 },

    /// The frame structure itself is malformed
    #[error("malformed frame at chunk {chunk}: {reason}")]
    Frame { chunk: u64, reason: &'static str },

    /// Sealing a chunk failed
    #[error("encryption failed at chunk {chunk}")]
    Encrypt { chunk: u64 },

    /// The key material could not be parsed
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
}

impl CodecError {
    /// Extracts the codec error carried by an I/O error, if any.
    pub fn from_io(err: &std::io::Error) -> Option<&CodecError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<CodecError>())
    }
}
