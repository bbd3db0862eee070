use chrono::{DateTime, Utc};

/// A stored file's identity and metadata.
///
/// A `FileRef` is a snapshot taken at the time of the store call that
/// produced it; there are no caching guarantees across calls. The `path` is
/// a logical slash-separated key, unique within a store, and `size` is
/// always the logical (plaintext) size even when the store encrypts content
/// at rest.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileRef {
    /// Logical path of the file within its store
    pub path: String,

    /// Size of the file content in bytes, before any encryption
    pub size: u64,

    /// When the file was last written (UTC)
    pub last_modified: DateTime<Utc>,

    /// Media type, if declared by the uploader or detected from content
    ///
    /// Best-effort; `None` when the backend has no record of it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FileRef {
    /// Returns the final path segment (the file name).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
