use crate::{CodecError, EncryptionKey};
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use std::io::{self, Read};

/// Plaintext bytes consumed per frame.
///
/// 256 KiB bounds memory use on both sides while keeping the per-chunk
/// authentication overhead negligible for large files.
pub const CHUNK_SIZE: usize = 256 * 1024;

const LEN_PREFIX_LEN: usize = 4;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Fixed ciphertext overhead per frame: length prefix, nonce and GCM tag.
pub const FRAME_OVERHEAD: u64 = (LEN_PREFIX_LEN + NONCE_LEN + TAG_LEN) as u64;

/// Computes the plaintext size of a ciphertext from its stored size.
///
/// Each frame carries exactly [`FRAME_OVERHEAD`] bytes on top of its
/// plaintext, so the logical size follows from the ciphertext length alone.
/// Stores use this to report plaintext sizes when listing encrypted files
/// without touching the content.
///
/// # Errors
///
/// Returns [`CodecError::Frame`] if `cipher_len` cannot be decomposed into
/// whole frames, which means the stored bytes were not produced by this
/// codec.
pub fn plaintext_len(cipher_len: u64) -> Result<u64, CodecError> {
    let frame_len = CHUNK_SIZE as u64 + FRAME_OVERHEAD;
    let full_frames = cipher_len / frame_len;
    let remainder = cipher_len % frame_len;

    if remainder == 0 {
        return Ok(full_frames * CHUNK_SIZE as u64);
    }
    if remainder < FRAME_OVERHEAD {
        return Err(CodecError::Frame {
            chunk: full_frames,
            reason: "ciphertext length is not frame-aligned",
        });
    }
    Ok(full_frames * CHUNK_SIZE as u64 + (remainder - FRAME_OVERHEAD))
}

/// Reads until `buf` is full or the source is exhausted.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn codec_io_error(err: CodecError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Encrypts a plaintext stream into framed ciphertext.
///
/// Wraps any [`Read`] source; each call pulls at most one chunk of
/// plaintext from it. Every frame uses a fresh random nonce, so encrypting
/// the same content twice produces different ciphertext.
pub struct EncryptingReader<R> {
    inner: R,
    cipher: Aes256Gcm,
    frame: Vec<u8>,
    pos: usize,
    chunk: u64,
    done: bool,
}

impl<R: Read> EncryptingReader<R> {
    /// Creates an encrypting adapter over `inner`, keyed by `key`.
    pub fn new(inner: R, key: &EncryptionKey) -> Self {
        Self {
            inner,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
            frame: Vec::new(),
            pos: 0,
            chunk: 0,
            done: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut plain = vec![0u8; CHUNK_SIZE];
        let n = read_up_to(&mut self.inner, &mut plain)?;
        if n == 0 {
            self.done = true;
            return Ok(());
        }
        plain.truncate(n);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plain.as_slice())
            .map_err(|_| codec_io_error(CodecError::Encrypt { chunk: self.chunk }))?;

        let body_len = (NONCE_LEN + ciphertext.len()) as u32;
        self.frame.clear();
        self.frame.extend_from_slice(&body_len.to_le_bytes());
        self.frame.extend_from_slice(&nonce);
        self.frame.extend_from_slice(&ciphertext);
        self.pos = 0;
        self.chunk += 1;
        Ok(())
    }
}

impl<R: Read> Read for EncryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.frame.len() {
            if self.done {
                return Ok(0);
            }
            self.refill()?;
            if self.done {
                return Ok(0);
            }
        }
        let n = (self.frame.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.frame[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Decrypts a framed ciphertext stream back into plaintext.
///
/// Each frame is authenticated before any of its plaintext is yielded; a
/// wrong key or a single flipped bit fails the read with an
/// [`io::ErrorKind::InvalidData`] error carrying
/// [`CodecError::Integrity`]. Chunks already handed to the caller were
/// verified. Dropping the reader mid-stream does no further work.
pub struct DecryptingReader<R> {
    inner: R,
    cipher: Aes256Gcm,
    plain: Vec<u8>,
    pos: usize,
    chunk: u64,
    done: bool,
}

impl<R: Read> DecryptingReader<R> {
    /// Creates a decrypting adapter over `inner`, keyed by `key`.
    pub fn new(inner: R, key: &EncryptionKey) -> Self {
        Self {
            inner,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
            plain: Vec::new(),
            pos: 0,
            chunk: 0,
            done: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut len_bytes = [0u8; LEN_PREFIX_LEN];
        let n = read_up_to(&mut self.inner, &mut len_bytes)?;
        if n == 0 {
            self.done = true;
            return Ok(());
        }
        if n < LEN_PREFIX_LEN {
            return Err(codec_io_error(CodecError::Frame {
                chunk: self.chunk,
                reason: "truncated length prefix",
            }));
        }

        let body_len = u32::from_le_bytes(len_bytes) as usize;
        if body_len < NONCE_LEN + TAG_LEN || body_len > CHUNK_SIZE + NONCE_LEN + TAG_LEN {
            return Err(codec_io_error(CodecError::Frame {
                chunk: self.chunk,
                reason: "frame length out of range",
            }));
        }

        let mut body = vec![0u8; body_len];
        let n = read_up_to(&mut self.inner, &mut body)?;
        if n < body_len {
            return Err(codec_io_error(CodecError::Frame {
                chunk: self.chunk,
                reason: "truncated frame",
            }));
        }

        let nonce = Nonce::from_slice(&body[..NONCE_LEN]);
        self.plain = self
            .cipher
            .decrypt(nonce, &body[NONCE_LEN..])
            .map_err(|_| codec_io_error(CodecError::Integrity { chunk: self.chunk }))?;
        self.pos = 0;
        self.chunk += 1;
        Ok(())
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.plain.len() {
            if self.done {
                return Ok(0);
            }
            self.refill()?;
        }
        let n = (self.plain.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.plain[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn key() -> EncryptionKey {
        EncryptionKey::from_bytes([42u8; 32])
    }

    fn encrypt(plain: &[u8], key: &EncryptionKey) -> Vec<u8> {
        let mut out = Vec::new();
        EncryptingReader::new(Cursor::new(plain.to_vec()), key)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    fn decrypt(cipher: &[u8], key: &EncryptionKey) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        DecryptingReader::new(Cursor::new(cipher.to_vec()), key).read_to_end(&mut out)?;
        Ok(out)
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_round_trip_small() {
        let key = key();
        let plain = b"hello, cask".to_vec();
        let cipher = encrypt(&plain, &key);
        assert_eq!(decrypt(&cipher, &key).unwrap(), plain);
    }

    #[test]
    fn test_round_trip_empty() {
        let key = key();
        let cipher = encrypt(&[], &key);
        assert!(cipher.is_empty());
        assert_eq!(decrypt(&cipher, &key).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_round_trip_multiple_chunks() {
        let key = key();
        let plain = patterned(2 * CHUNK_SIZE + 1234);
        let cipher = encrypt(&plain, &key);
        assert_eq!(cipher.len() as u64, plain.len() as u64 + 3 * FRAME_OVERHEAD);
        assert_eq!(decrypt(&cipher, &key).unwrap(), plain);
    }

    #[test]
    fn test_ciphertext_varies_between_runs() {
        let key = key();
        let plain = patterned(1000);
        // Fresh nonce per chunk, so identical input never repeats on the wire.
        assert_ne!(encrypt(&plain, &key), encrypt(&plain, &key));
    }

    #[test]
    fn test_tampered_frame_fails_integrity() {
        let key = key();
        let plain = patterned(1000);
        let mut cipher = encrypt(&plain, &key);
        let mid = cipher.len() / 2;
        cipher[mid] ^= 0x01;

        let err = decrypt(&cipher, &key).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(
            CodecError::from_io(&err),
            Some(CodecError::Integrity { chunk: 0 })
        ));
    }

    #[test]
    fn test_tamper_in_second_chunk_yields_first_chunk_then_fails() {
        let key = key();
        let plain = patterned(CHUNK_SIZE + 500);
        let mut cipher = encrypt(&plain, &key);
        // Flip a bit inside the second frame's ciphertext.
        let second_frame_payload = CHUNK_SIZE as u64 + FRAME_OVERHEAD + FRAME_OVERHEAD;
        cipher[second_frame_payload as usize] ^= 0x80;

        let mut reader = DecryptingReader::new(Cursor::new(cipher), &key);
        let mut first = vec![0u8; CHUNK_SIZE];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(first, plain[..CHUNK_SIZE]);

        let err = reader.read(&mut [0u8; 16]).unwrap_err();
        assert!(matches!(
            CodecError::from_io(&err),
            Some(CodecError::Integrity { chunk: 1 })
        ));
    }

    #[test]
    fn test_wrong_key_fails_integrity() {
        let plain = patterned(100);
        let cipher = encrypt(&plain, &key());
        let other = EncryptionKey::from_bytes([7u8; 32]);

        let err = decrypt(&cipher, &other).unwrap_err();
        assert!(matches!(
            CodecError::from_io(&err),
            Some(CodecError::Integrity { chunk: 0 })
        ));
    }

    #[test]
    fn test_truncated_stream_fails_framing() {
        let key = key();
        let cipher = encrypt(&patterned(100), &key);

        let err = decrypt(&cipher[..cipher.len() - 10], &key).unwrap_err();
        assert!(matches!(
            CodecError::from_io(&err),
            Some(CodecError::Frame { chunk: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_length_prefix_fails_framing() {
        let key = key();
        let mut cipher = encrypt(&patterned(100), &key);
        cipher[..4].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = decrypt(&cipher, &key).unwrap_err();
        assert!(matches!(
            CodecError::from_io(&err),
            Some(CodecError::Frame { chunk: 0, .. })
        ));
    }

    #[test]
    fn test_plaintext_len_matches_encrypted_sizes() {
        let key = key();
        for len in [0usize, 1, 100, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 2 * CHUNK_SIZE] {
            let cipher = encrypt(&patterned(len), &key);
            assert_eq!(plaintext_len(cipher.len() as u64).unwrap(), len as u64);
        }
    }

    #[test]
    fn test_plaintext_len_rejects_misaligned_sizes() {
        assert!(plaintext_len(5).is_err());
        assert!(plaintext_len(FRAME_OVERHEAD - 1).is_err());
    }
}
