use crate::store::{sniff_local_file, CountingReader, FileRefIter, FilesStore};
use crate::{StoreError, StoreResult, TransportError};
use cask_codec::{plaintext_len, DecryptingReader, EncryptingReader, EncryptionKey};
use cask_types::{path as logical, FileRef};
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Path;

/// Connection settings for an S3-compatible object storage backend.
///
/// Consumed by concrete [`ObjectClient`] implementations; the store itself
/// only uses `key_prefix`. Deserialisable so deployments can load it from
/// configuration; the secret key is redacted from `Debug` output.
#[derive(Clone, serde::Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,

    /// Prefix applied transparently to every logical path
    #[serde(default)]
    pub key_prefix: String,
}

impl std::fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

/// One object in a listing page.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    /// Stored size in bytes (ciphertext size for encrypted stores)
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct ObjectPage {
    pub entries: Vec<ObjectEntry>,
    /// Token for the next page; `None` when this page is the last
    pub continuation: Option<String>,
}

/// The byte-level transport capability of an object storage backend.
///
/// Implementations map these operations onto get-object / put-object /
/// list-objects-with-continuation / copy-object / delete-object calls and
/// raise [`TransportError`] for backend faults. Keys are raw backend keys;
/// logical-path handling stays in [`ObjectFilesStore`].
pub trait ObjectClient {
    /// Opens the object at `key` for reading.
    fn get_object(&self, key: &str) -> Result<Box<dyn Read + Send>, TransportError>;

    /// Writes `content` to `key`, overwriting, and returns the stored
    /// byte count.
    fn put_object(
        &self,
        key: &str,
        content: &mut dyn Read,
        content_type: Option<&str>,
    ) -> Result<u64, TransportError>;

    /// Fetches one page of keys starting with `key_prefix`, in
    /// backend-native (lexicographic) order.
    fn list_page(
        &self,
        key_prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage, TransportError>;

    /// Checks existence without fetching content.
    fn object_exists(&self, key: &str) -> Result<bool, TransportError>;

    /// Server-side copy from `source_key` to `destination_key`.
    fn copy_object(&self, source_key: &str, destination_key: &str)
        -> Result<(), TransportError>;

    /// Deletes the object at `key`; deleting an absent key succeeds.
    fn delete_object(&self, key: &str) -> Result<(), TransportError>;
}

/// File storage backed by an S3-compatible bucket.
///
/// Composes an injected transport client with an optional encryption key
/// and an optional key prefix. Listing pages through the backend's
/// paginated API transparently; callers see one lazy sequence and no
/// continuation tokens.
#[derive(Debug)]
pub struct ObjectFilesStore<C> {
    client: C,
    key_prefix: String,
    key: Option<EncryptionKey>,
}

impl<C: ObjectClient> ObjectFilesStore<C> {
    /// Creates a store over `client`.
    ///
    /// A non-empty `key_prefix` is normalised to end with `/` and applied
    /// to every logical path before it reaches the client.
    pub fn new(client: C, key_prefix: &str, key: Option<EncryptionKey>) -> Self {
        let key_prefix = if key_prefix.is_empty() || key_prefix.ends_with('/') {
            key_prefix.to_string()
        } else {
            format!("{key_prefix}/")
        };
        Self {
            client,
            key_prefix,
            key,
        }
    }

    /// Creates a store taking the key prefix from `config`.
    pub fn from_config(client: C, config: &ObjectStoreConfig, key: Option<EncryptionKey>) -> Self {
        Self::new(client, &config.key_prefix, key)
    }

    fn to_key(&self, clean: &str) -> String {
        format!("{}{}", self.key_prefix, clean)
    }

    fn from_key<'k>(&self, key: &'k str) -> &'k str {
        key.strip_prefix(&self.key_prefix).unwrap_or(key)
    }

    fn logical_size(&self, stored: u64) -> StoreResult<u64> {
        match &self.key {
            Some(_) => Ok(plaintext_len(stored)?),
            None => Ok(stored),
        }
    }
}

impl<C: ObjectClient> FilesStore for ObjectFilesStore<C> {
    fn write_file(
        &self,
        content: &mut dyn Read,
        destination: &str,
        content_type: Option<&str>,
    ) -> StoreResult<FileRef> {
        let clean = logical::sanitize(destination)?;
        let object_key = self.to_key(&clean);

        let mut counted = CountingReader::new(content);
        match &self.key {
            Some(key) => {
                let mut encrypting = EncryptingReader::new(&mut counted, key);
                self.client
                    .put_object(&object_key, &mut encrypting, content_type)
            }
            None => self.client.put_object(&object_key, &mut counted, content_type),
        }?;

        tracing::debug!(path = %clean, "wrote object");
        Ok(FileRef {
            path: clean,
            size: counted.bytes_read(),
            last_modified: Utc::now(),
            content_type: content_type.map(str::to_string),
        })
    }

    fn write_local_file(&self, source: &Path, destination: &str) -> StoreResult<FileRef> {
        let (content_type, mut reader) = sniff_local_file(source)?;
        self.write_file(&mut reader, destination, content_type.as_deref())
    }

    fn get_file(&self, path: &str) -> StoreResult<Box<dyn Read + Send>> {
        let clean = logical::sanitize(path)?;
        let reader = match self.client.get_object(&self.to_key(&clean)) {
            Ok(reader) => reader,
            Err(TransportError::NoSuchKey(_)) => return Err(StoreError::NotFound(clean)),
            Err(e) => return Err(e.into()),
        };
        match &self.key {
            Some(key) => Ok(Box::new(DecryptingReader::new(reader, key))),
            None => Ok(reader),
        }
    }

    fn list_files(&self, prefix: &str) -> StoreResult<FileRefIter<'_>> {
        let prefix = logical::sanitize_prefix(prefix)?;
        Ok(Box::new(ObjectListing {
            store: self,
            list_prefix: self.to_key(&prefix),
            page: Vec::new().into_iter(),
            continuation: None,
            done: false,
        }))
    }

    fn file_exists(&self, path: &str) -> StoreResult<bool> {
        let clean = logical::sanitize(path)?;
        Ok(self.client.object_exists(&self.to_key(&clean))?)
    }

    fn copy_file(&self, source: &str, destination: &str) -> StoreResult<()> {
        let src_clean = logical::sanitize(source)?;
        let dst_clean = logical::sanitize(destination)?;
        // Server-side ciphertext copy; no decrypt/re-encrypt round trip.
        match self
            .client
            .copy_object(&self.to_key(&src_clean), &self.to_key(&dst_clean))
        {
            Ok(()) => {
                tracing::debug!(source = %src_clean, destination = %dst_clean, "copied object");
                Ok(())
            }
            Err(TransportError::NoSuchKey(_)) => Err(StoreError::NotFound(src_clean)),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_file(&self, path: &str) -> StoreResult<()> {
        let clean = logical::sanitize(path)?;
        match self.client.delete_object(&self.to_key(&clean)) {
            Ok(()) | Err(TransportError::NoSuchKey(_)) => {
                tracing::debug!(path = %clean, "deleted object");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Lazy, pull-based listing over paginated backend results.
///
/// Pages are fetched only as the iterator is consumed; a transport failure
/// is yielded once as an `Err` item and ends the sequence.
struct ObjectListing<'a, C> {
    store: &'a ObjectFilesStore<C>,
    list_prefix: String,
    page: std::vec::IntoIter<ObjectEntry>,
    continuation: Option<String>,
    done: bool,
}

impl<C: ObjectClient> ObjectListing<'_, C> {
    fn entry_to_ref(&self, entry: ObjectEntry) -> StoreResult<FileRef> {
        Ok(FileRef {
            path: self.store.from_key(&entry.key).to_string(),
            size: self.store.logical_size(entry.size)?,
            last_modified: entry.last_modified,
            content_type: None,
        })
    }
}

impl<C: ObjectClient> Iterator for ObjectListing<'_, C> {
    type Item = StoreResult<FileRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.page.next() {
                return Some(self.entry_to_ref(entry));
            }
            if self.done {
                return None;
            }
            match self
                .store
                .client
                .list_page(&self.list_prefix, self.continuation.as_deref())
            {
                Ok(page) => {
                    self.continuation = page.continuation;
                    if self.continuation.is_none() {
                        self.done = true;
                    }
                    self.page = page.entries.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    self.page = Vec::new().into_iter();
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
