use crate::object::{ObjectClient, ObjectEntry, ObjectPage};
use crate::TransportError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// An in-process [`ObjectClient`] over a sorted map.
///
/// Stands in for a real S3 client in tests and local development. Keys are
/// listed in lexicographic order and paginated with continuation tokens,
/// matching S3 `list-objects-v2` behaviour, so pagination handling in
/// [`crate::ObjectFilesStore`] is exercised the same way it would be
/// against a bucket.
#[derive(Debug)]
pub struct MemoryObjectClient {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
    pages_served: AtomicUsize,
}

impl MemoryObjectClient {
    /// Creates an empty client with the S3-default page size of 1000 keys.
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// Creates an empty client that returns at most `page_size` keys per
    /// listing page. Small sizes force multi-page listings in tests.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            pages_served: AtomicUsize::new(0),
        }
    }

    /// Number of listing pages served so far.
    ///
    /// Lets tests assert that a paged listing fetches pages only as its
    /// consumer pulls entries, rather than all up front.
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::Relaxed)
    }

    /// Returns the raw stored bytes at `key`, if present.
    ///
    /// Lets tests assert on what actually crossed the transport (for an
    /// encrypted store, ciphertext).
    pub fn raw_object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).map(|o| o.data.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectClient for MemoryObjectClient {
    fn get_object(&self, key: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        let objects = self.lock();
        let stored = objects
            .get(key)
            .ok_or_else(|| TransportError::NoSuchKey(key.to_string()))?;
        Ok(Box::new(Cursor::new(stored.data.clone())))
    }

    fn put_object(
        &self,
        key: &str,
        content: &mut dyn Read,
        _content_type: Option<&str>,
    ) -> Result<u64, TransportError> {
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;
        let size = data.len() as u64;
        self.lock().insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(size)
    }

    fn list_page(
        &self,
        key_prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage, TransportError> {
        self.pages_served.fetch_add(1, Ordering::Relaxed);
        let objects = self.lock();
        let start = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };

        let mut entries = Vec::new();
        let mut next = None;
        for (key, stored) in objects.range((start, Bound::Unbounded)) {
            if !key.starts_with(key_prefix) {
                // Keys are sorted, so once past the prefix range nothing
                // further can match.
                if !entries.is_empty() || key.as_str() > key_prefix {
                    break;
                }
                continue;
            }
            if entries.len() == self.page_size {
                next = entries.last().map(|e: &ObjectEntry| e.key.clone());
                break;
            }
            entries.push(ObjectEntry {
                key: key.clone(),
                size: stored.data.len() as u64,
                last_modified: stored.last_modified,
            });
        }

        Ok(ObjectPage {
            entries,
            continuation: next,
        })
    }

    fn object_exists(&self, key: &str) -> Result<bool, TransportError> {
        Ok(self.lock().contains_key(key))
    }

    fn copy_object(
        &self,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), TransportError> {
        let mut objects = self.lock();
        let source = objects
            .get(source_key)
            .ok_or_else(|| TransportError::NoSuchKey(source_key.to_string()))?
            .clone();
        objects.insert(
            destination_key.to_string(),
            StoredObject {
                data: source.data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<(), TransportError> {
        self.lock().remove(key);
        Ok(())
    }
}
