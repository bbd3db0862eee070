use crate::store::{sniff_local_file, CountingReader, FileRefIter, FilesStore};
use crate::{StoreError, StoreResult};
use cask_codec::{plaintext_len, DecryptingReader, EncryptingReader, EncryptionKey};
use cask_types::{path as logical, FileRef};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// File storage backed by a directory on the local filesystem.
///
/// Logical paths map to files under a configured root; the root is created
/// and canonicalised at construction and every operation is confined to it
/// (traversal attempts fail with [`StoreError::InvalidPath`] before any
/// filesystem call). When an encryption key is configured, bytes on disk
/// are framed ciphertext and everything reported to callers stays in
/// plaintext terms.
///
/// Concurrent writers to the same path race per normal filesystem
/// semantics; the store adds no ordering of its own.
#[derive(Debug)]
pub struct LocalFilesStore {
    root: PathBuf,
    key: Option<EncryptionKey>,
}

impl LocalFilesStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    ///
    /// `key` fixes the store to encrypted or plaintext mode for its
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if the root cannot be created or
    /// canonicalised.
    pub fn new(root: &Path, key: Option<EncryptionKey>) -> StoreResult<Self> {
        fs::create_dir_all(root).map_err(|e| {
            StoreError::Transport(
                io::Error::new(
                    e.kind(),
                    format!("failed to create store root {}: {}", root.display(), e),
                )
                .into(),
            )
        })?;
        let root = root.canonicalize().map_err(|e| {
            StoreError::Transport(
                io::Error::new(
                    e.kind(),
                    format!("cannot canonicalize store root {}: {}", root.display(), e),
                )
                .into(),
            )
        })?;
        Ok(Self { root, key })
    }

    /// Sanitises a logical path and resolves it under the root.
    fn resolve(&self, path: &str) -> StoreResult<(String, PathBuf)> {
        let clean = logical::sanitize(path)?;
        let full = self.root.join(&clean);
        Ok((clean, full))
    }

    /// The logical (plaintext) size of a stored file, from its on-disk
    /// size.
    fn logical_size(&self, stored: u64) -> StoreResult<u64> {
        match &self.key {
            Some(_) => Ok(plaintext_len(stored)?),
            None => Ok(stored),
        }
    }

    /// Recursively collects file references under `dir`.
    fn walk(
        &self,
        dir: &Path,
        prefix: &str,
        out: &mut Vec<StoreResult<FileRef>>,
    ) -> StoreResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| StoreError::Transport(e.into()))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Transport(e.into()))?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, prefix, out)?;
                continue;
            }

            let rel = path
                .strip_prefix(&self.root)
                .expect("walked path is under the root");
            let rel: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let rel = rel.join("/");
            if !rel.starts_with(prefix) {
                continue;
            }

            out.push(self.stat_to_ref(rel, &path));
        }
        Ok(())
    }

    fn stat_to_ref(&self, rel: String, full: &Path) -> StoreResult<FileRef> {
        let meta = fs::metadata(full).map_err(|e| StoreError::Transport(e.into()))?;
        let last_modified: DateTime<Utc> = meta
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(FileRef {
            size: self.logical_size(meta.len())?,
            path: rel,
            last_modified,
            content_type: None,
        })
    }

    fn write_stream(
        &self,
        content: &mut dyn Read,
        clean: &str,
        full: &Path,
        content_type: Option<&str>,
    ) -> StoreResult<FileRef> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::Transport(
                    io::Error::new(
                        e.kind(),
                        format!("failed to create directory {}: {}", parent.display(), e),
                    )
                    .into(),
                )
            })?;
        }

        let mut file = fs::File::create(full).map_err(|e| {
            StoreError::Transport(
                io::Error::new(
                    e.kind(),
                    format!("failed to create file {}: {}", full.display(), e),
                )
                .into(),
            )
        })?;

        let mut counted = CountingReader::new(content);
        match &self.key {
            Some(key) => {
                let mut encrypting = EncryptingReader::new(&mut counted, key);
                io::copy(&mut encrypting, &mut file)
            }
            None => io::copy(&mut counted, &mut file),
        }
        .map_err(|e| StoreError::Transport(e.into()))?;

        tracing::debug!(path = %clean, "wrote file");
        Ok(FileRef {
            path: clean.to_string(),
            size: counted.bytes_read(),
            last_modified: Utc::now(),
            content_type: content_type.map(str::to_string),
        })
    }
}

impl FilesStore for LocalFilesStore {
    fn write_file(
        &self,
        content: &mut dyn Read,
        destination: &str,
        content_type: Option<&str>,
    ) -> StoreResult<FileRef> {
        let (clean, full) = self.resolve(destination)?;
        self.write_stream(content, &clean, &full, content_type)
    }

    fn write_local_file(&self, source: &Path, destination: &str) -> StoreResult<FileRef> {
        let (clean, full) = self.resolve(destination)?;
        let (content_type, mut reader) = sniff_local_file(source)?;
        self.write_stream(&mut reader, &clean, &full, content_type.as_deref())
    }

    fn get_file(&self, path: &str) -> StoreResult<Box<dyn Read + Send>> {
        let (clean, full) = self.resolve(path)?;
        if !full.is_file() {
            return Err(StoreError::NotFound(clean));
        }
        let file = fs::File::open(&full).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(clean.clone())
            } else {
                StoreError::Transport(e.into())
            }
        })?;
        match &self.key {
            Some(key) => Ok(Box::new(DecryptingReader::new(file, key))),
            None => Ok(Box::new(file)),
        }
    }

    fn list_files(&self, prefix: &str) -> StoreResult<FileRefIter<'_>> {
        let prefix = logical::sanitize_prefix(prefix)?;
        let mut out = Vec::new();
        if self.root.is_dir() {
            let root = self.root.clone();
            self.walk(&root, &prefix, &mut out)?;
        }
        out.sort_by(|a, b| match (a, b) {
            (Ok(a), Ok(b)) => a.path.cmp(&b.path),
            _ => std::cmp::Ordering::Equal,
        });
        Ok(Box::new(out.into_iter()))
    }

    fn file_exists(&self, path: &str) -> StoreResult<bool> {
        let (_, full) = self.resolve(path)?;
        Ok(full.is_file())
    }

    fn copy_file(&self, source: &str, destination: &str) -> StoreResult<()> {
        let (src_clean, src_full) = self.resolve(source)?;
        let (dst_clean, dst_full) = self.resolve(destination)?;
        if !src_full.is_file() {
            return Err(StoreError::NotFound(src_clean));
        }
        if let Some(parent) = dst_full.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Transport(e.into()))?;
        }
        // Ciphertext is copied as-is; the key has not changed.
        fs::copy(&src_full, &dst_full).map_err(|e| StoreError::Transport(e.into()))?;
        tracing::debug!(source = %src_clean, destination = %dst_clean, "copied file");
        Ok(())
    }

    fn delete_file(&self, path: &str) -> StoreResult<()> {
        let (clean, full) = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => {
                tracing::debug!(path = %clean, "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Transport(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Upload;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn plain_store(temp: &TempDir) -> LocalFilesStore {
        LocalFilesStore::new(&temp.path().join("store"), None).unwrap()
    }

    fn encrypted_store(temp: &TempDir) -> LocalFilesStore {
        let key = EncryptionKey::from_bytes([9u8; 32]);
        LocalFilesStore::new(&temp.path().join("store"), Some(key)).unwrap()
    }

    fn write(store: &LocalFilesStore, path: &str, content: &[u8]) -> FileRef {
        store
            .write_file(&mut Cursor::new(content.to_vec()), path, None)
            .unwrap()
    }

    fn read(store: &LocalFilesStore, path: &str) -> Vec<u8> {
        let mut out = Vec::new();
        store.get_file(path).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_write_read_round_trip_plaintext() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);

        let file_ref = write(&store, "docs/note.txt", b"hello");
        assert_eq!(file_ref.path, "docs/note.txt");
        assert_eq!(file_ref.size, 5);
        assert_eq!(read(&store, "docs/note.txt"), b"hello");
    }

    #[test]
    fn test_write_read_round_trip_encrypted() {
        let temp = TempDir::new().unwrap();
        let store = encrypted_store(&temp);

        let content = vec![0x5A; 10_000];
        let file_ref = write(&store, "blob.bin", &content);
        assert_eq!(file_ref.size, 10_000);
        assert_eq!(read(&store, "blob.bin"), content);

        // The bytes on disk are ciphertext, larger than the plaintext.
        let raw = fs::read(temp.path().join("store/blob.bin")).unwrap();
        assert!(raw.len() > content.len());
        assert!(!raw.windows(16).any(|w| w == &content[..16]));
    }

    #[test]
    fn test_overwrite_is_last_write_wins() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);

        write(&store, "a.txt", b"first");
        let file_ref = write(&store, "a.txt", b"second version");
        assert_eq!(file_ref.size, 14);
        assert_eq!(read(&store, "a.txt"), b"second version");
    }

    #[test]
    fn test_get_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        assert!(matches!(
            store.get_file("absent.txt"),
            Err(StoreError::NotFound(p)) if p == "absent.txt"
        ));
    }

    #[test]
    fn test_traversal_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);

        for op in [
            store
                .write_file(&mut Cursor::new(b"x".to_vec()), "../escape.txt", None)
                .err(),
            store.get_file("../../etc/passwd").err(),
            store.list_files("../other").err(),
        ] {
            assert!(matches!(op, Some(StoreError::InvalidPath(_))));
        }
    }

    #[test]
    fn test_leading_slash_is_normalised() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        let file_ref = write(&store, "/folder/file.txt", b"x");
        assert_eq!(file_ref.path, "folder/file.txt");
        assert!(store.file_exists("folder/file.txt").unwrap());
    }

    #[test]
    fn test_list_files_with_prefix() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        write(&store, "a/one.txt", b"1");
        write(&store, "a/two.txt", b"22");
        write(&store, "b/three.txt", b"333");

        let all: Vec<FileRef> = store
            .list_files("")
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(all.len(), 3);

        let under_a: Vec<FileRef> = store
            .list_files("a")
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        let paths: Vec<&str> = under_a.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["a/one.txt", "a/two.txt"]);
        assert_eq!(under_a[1].size, 2);
    }

    #[test]
    fn test_encrypted_listing_reports_plaintext_sizes() {
        let temp = TempDir::new().unwrap();
        let store = encrypted_store(&temp);
        write(&store, "data/a.bin", &vec![1u8; 1234]);

        let refs: Vec<FileRef> = store
            .list_files("")
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].size, 1234);
    }

    #[test]
    fn test_copy_preserves_content_and_source() {
        let temp = TempDir::new().unwrap();
        let store = encrypted_store(&temp);
        write(&store, "orig.bin", b"payload");

        store.copy_file("orig.bin", "copies/dup.bin").unwrap();
        assert!(store.file_exists("orig.bin").unwrap());
        assert_eq!(read(&store, "orig.bin"), read(&store, "copies/dup.bin"));

        // Byte-level copy: ciphertext identical on disk, no re-encryption.
        let a = fs::read(temp.path().join("store/orig.bin")).unwrap();
        let b = fs::read(temp.path().join("store/copies/dup.bin")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_copy_missing_source_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        assert!(matches!(
            store.copy_file("absent.txt", "dst.txt"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_move_file_removes_source() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        write(&store, "from.txt", b"moving");

        store.move_file("from.txt", "to/dest.txt").unwrap();
        assert!(!store.file_exists("from.txt").unwrap());
        assert_eq!(read(&store, "to/dest.txt"), b"moving");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        write(&store, "gone.txt", b"x");

        store.delete_file("gone.txt").unwrap();
        store.delete_file("gone.txt").unwrap();
        assert!(!store.file_exists("gone.txt").unwrap());
    }

    #[test]
    fn test_delete_files_removes_everything_under_prefix() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        write(&store, "drafts/a.txt", b"x");
        write(&store, "drafts/deep/b.txt", b"x");
        write(&store, "published/c.txt", b"x");

        store.delete_files("drafts/").unwrap();

        assert!(!store.file_exists("drafts/a.txt").unwrap());
        assert!(!store.file_exists("drafts/deep/b.txt").unwrap());
        assert!(store.file_exists("published/c.txt").unwrap());

        // An already-empty prefix is fine.
        store.delete_files("drafts/").unwrap();
    }

    #[test]
    fn test_wrong_key_read_fails_integrity() {
        let temp = TempDir::new().unwrap();
        {
            let store = encrypted_store(&temp);
            write(&store, "secret.bin", b"classified");
        }
        let other = LocalFilesStore::new(
            &temp.path().join("store"),
            Some(EncryptionKey::from_bytes([1u8; 32])),
        )
        .unwrap();

        let mut reader = other.get_file("secret.bin").unwrap();
        let err = reader.read_to_end(&mut Vec::new()).unwrap_err();
        assert!(matches!(
            cask_codec::CodecError::from_io(&err),
            Some(cask_codec::CodecError::Integrity { .. })
        ));
    }

    #[test]
    fn test_write_local_file_sniffs_content_type() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);

        let source = temp.path().join("photo.png");
        let mut content = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        content.extend_from_slice(&[7u8; 100]);
        fs::write(&source, &content).unwrap();

        let file_ref = store.write_local_file(&source, "media/photo.png").unwrap();
        assert_eq!(file_ref.content_type.as_deref(), Some("image/png"));
        assert_eq!(file_ref.size, content.len() as u64);
        assert_eq!(read(&store, "media/photo.png"), content);
    }

    #[test]
    fn test_write_local_file_missing_source() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        assert!(matches!(
            store.write_local_file(&temp.path().join("no-such-file"), "x.bin"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_store_upload_lands_under_folder() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);

        let mut content = Cursor::new(b"report body".to_vec());
        let file_ref = store
            .store_upload(
                Upload {
                    name: "report.pdf".to_string(),
                    size: 11,
                    content_type: Some("application/pdf".to_string()),
                    content: &mut content,
                },
                "uploads/2026",
            )
            .unwrap();

        assert_eq!(file_ref.path, "uploads/2026/report.pdf");
        assert_eq!(file_ref.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(read(&store, "uploads/2026/report.pdf"), b"report body");
    }

    #[test]
    fn test_listing_feeds_tree_builder() {
        let temp = TempDir::new().unwrap();
        let store = plain_store(&temp);
        write(&store, "a/x", b"1");
        write(&store, "a/y", b"2");
        write(&store, "b/z", b"3");

        let refs: Vec<FileRef> = store
            .list_files("")
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        let mut builder = cask_tree::FileNodeBuilder::from_name("root");
        builder.add_files(refs).unwrap();
        let tree = builder.build().unwrap();

        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name, "a");
        assert_eq!(tree.children[1].name, "b");
        assert_eq!(tree.children[0].children.len(), 2);
    }
}
