use crate::{StoreError, StoreResult};
use cask_types::{path, FileRef};
use std::io::{self, Read};
use std::path::Path;

/// A lazy sequence of file references produced by a listing.
///
/// Finite and not restartable; each `list_files` call re-lists. Backends
/// that page (object storage) fetch pages only as the iterator is pulled,
/// so abandoning it mid-sequence leaves nothing dangling.
pub type FileRefIter<'a> = Box<dyn Iterator<Item = StoreResult<FileRef>> + 'a>;

/// A file handed in by an upload layer: name, declared size and an opaque
/// content stream.
///
/// This is the only coupling point to a web framework; the store treats it
/// as a producer of bytes and trusts `size` only for pre-persist checks
/// (see [`crate::FileChecker`]), never for accounting.
pub struct Upload<'a> {
    /// File name as declared by the uploader
    pub name: String,

    /// Declared content length in bytes
    pub size: u64,

    /// Declared media type, if any
    pub content_type: Option<String>,

    /// The content stream
    pub content: &'a mut dyn Read,
}

impl std::fmt::Debug for Upload<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Uniform CRUD over files for one storage backend.
///
/// Paths are logical slash-separated keys, sanitised before the backend
/// sees them; traversal outside the store root fails with
/// [`StoreError::InvalidPath`]. A store is configured once (backend plus
/// optional encryption key) and is stateless between calls.
pub trait FilesStore {
    /// Writes a content stream to `destination`, overwriting any existing
    /// file there (last-write-wins).
    ///
    /// When the store holds an encryption key the content is encrypted in
    /// transit to the backend; the returned [`FileRef`] always reports the
    /// logical (plaintext) size.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidPath`] for a malformed destination,
    /// [`StoreError::Transport`] if the backend write fails.
    fn write_file(
        &self,
        content: &mut dyn Read,
        destination: &str,
        content_type: Option<&str>,
    ) -> StoreResult<FileRef>;

    /// Reads a file from a local filesystem path and writes it through the
    /// same pipeline as [`write_file`](Self::write_file), sniffing the
    /// content type from the leading bytes.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `source` does not exist, otherwise as
    /// [`write_file`](Self::write_file).
    fn write_local_file(&self, source: &Path, destination: &str) -> StoreResult<FileRef>;

    /// Opens the file at `path` for reading, decrypting transparently when
    /// the store holds a key.
    ///
    /// Decryption is verified chunk by chunk as the stream is consumed; a
    /// tampered file or wrong key surfaces as an `InvalidData` I/O error
    /// carrying [`cask_codec::CodecError::Integrity`] before any
    /// unverified plaintext is yielded.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no file exists at `path`.
    fn get_file(&self, path: &str) -> StoreResult<Box<dyn Read + Send>>;

    /// Lists every file whose logical path starts with `prefix`; an empty
    /// prefix lists the whole store.
    ///
    /// Ordering follows the backend (typically lexicographic by path) and
    /// is not guaranteed stable across backends; callers needing a
    /// deterministic order must sort.
    fn list_files(&self, prefix: &str) -> StoreResult<FileRefIter<'_>>;

    /// Checks whether a file exists at `path` without fetching content.
    ///
    /// Never fails with [`StoreError::NotFound`]; absence is `Ok(false)`.
    fn file_exists(&self, path: &str) -> StoreResult<bool>;

    /// Duplicates the file at `source` to `destination`.
    ///
    /// For encrypted stores this is a byte-level copy of the ciphertext —
    /// the key is unchanged, so no decrypt/re-encrypt round trip happens.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `source` does not exist.
    fn copy_file(&self, source: &str, destination: &str) -> StoreResult<()>;

    /// Removes the file at `path`. Deleting a non-existent path is not an
    /// error.
    fn delete_file(&self, path: &str) -> StoreResult<()>;

    /// Removes every file whose logical path starts with `prefix`.
    ///
    /// The matching paths are collected up front, then deleted one by one;
    /// files appearing under the prefix while the deletes run may survive.
    /// An empty prefix clears the whole store.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] if listing or any single delete fails;
    /// earlier deletes in the batch are not rolled back.
    fn delete_files(&self, prefix: &str) -> StoreResult<()> {
        let paths: Vec<String> = self
            .list_files(prefix)?
            .map(|entry| entry.map(|file| file.path))
            .collect::<StoreResult<_>>()?;
        for path in &paths {
            self.delete_file(path)?;
        }
        tracing::debug!(prefix, count = paths.len(), "deleted files under prefix");
        Ok(())
    }

    /// Moves the file at `source` to `destination`, as a copy followed by
    /// a delete of the source.
    ///
    /// **Not atomic**: if the process is interrupted between the two steps
    /// both paths may exist. Callers that need exactly-once semantics must
    /// compensate themselves.
    fn move_file(&self, source: &str, destination: &str) -> StoreResult<()> {
        self.copy_file(source, destination)?;
        self.delete_file(source)?;
        tracing::debug!(source, destination, "moved file");
        Ok(())
    }

    /// Stores an [`Upload`] under `folder`, at `folder/<name>`.
    ///
    /// An empty folder places the file at the store root.
    fn store_upload(&self, upload: Upload<'_>, folder: &str) -> StoreResult<FileRef> {
        let destination = path::join(folder, &upload.name);
        self.write_file(
            upload.content,
            &destination,
            upload.content_type.as_deref(),
        )
    }
}

/// Counts the bytes pulled through a reader.
///
/// Wrapped around the plaintext side of a write pipeline so the logical
/// size is known even when the bytes reaching the backend are ciphertext.
pub(crate) struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    pub(crate) fn bytes_read(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Reads the leading bytes of a local file to detect its media type, then
/// reassembles a reader over the full content.
///
/// Detection is best-effort, from `infer`'s magic-number table; unknown
/// content yields `None`.
pub(crate) fn sniff_local_file(source: &Path) -> StoreResult<(Option<String>, impl Read)> {
    let file = std::fs::File::open(source).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(source.display().to_string())
        } else {
            StoreError::Transport(e.into())
        }
    })?;

    let mut head = vec![0u8; 8192];
    let mut file = file;
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::Transport(e.into())),
        }
    }
    head.truncate(filled);

    let content_type = infer::get(&head).map(|kind| kind.mime_type().to_string());
    Ok((content_type, io::Cursor::new(head).chain(file)))
}
