use crate::{StoreError, StoreResult};

/// Default upload ceiling: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Validates the aggregate size of an upload batch before anything is
/// persisted.
///
/// Stateless across requests; works from upload metadata alone, so it
/// fails fast without reading any file content.
#[derive(Debug, Clone)]
pub struct FileChecker {
    max_size: u64,
}

impl FileChecker {
    /// Creates a checker with the given ceiling in bytes.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    /// Sums the declared sizes of `files` (`(name, size)` pairs).
    ///
    /// A total of exactly the limit passes; one byte over fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PayloadTooLarge`] carrying the computed total
    /// and the configured limit when the sum exceeds it.
    pub fn check_size<'a>(
        &self,
        files: impl IntoIterator<Item = (&'a str, u64)>,
    ) -> StoreResult<()> {
        let mut total: u64 = 0;
        let mut count: usize = 0;
        for (_name, size) in files {
            total = total.saturating_add(size);
            count += 1;
        }
        if total > self.max_size {
            return Err(StoreError::PayloadTooLarge {
                total,
                limit: self.max_size,
            });
        }
        tracing::debug!(count, total, "upload batch within size limit");
        Ok(())
    }
}

impl Default for FileChecker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_SIZE)
    }
}
