use crate::CodecError;
use aes_gcm::aead::OsRng;
use aes_gcm::{Aes256Gcm, KeyInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An opaque 256-bit symmetric encryption key.
///
/// The raw bytes are zeroised when the key is dropped and never appear in
/// `Debug` output or error messages. A store holding a key encrypts on
/// write and decrypts on read for its whole lifetime; a store without one
/// operates in plaintext mode.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Wraps existing key material.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a key from a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if the input is not valid hex or
    /// does not decode to exactly 32 bytes.
    pub fn from_hex(input: &str) -> Result<Self, CodecError> {
        let decoded =
            hex::decode(input).map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| CodecError::InvalidKey("expected 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }

    /// Generates a fresh random key from the operating system RNG.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self(key.into())
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}
