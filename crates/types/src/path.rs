//! Logical path sanitisation.
//!
//! Logical paths are store-relative, slash-separated keys. They are
//! normalised before any backend sees them: line breaks are stripped,
//! leading slashes and empty segments are dropped, and any `.` or `..`
//! segment is rejected outright so a path can never escape the store root.

/// Errors raised when validating a logical path.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// The path contained a `.` or `..` segment
    #[error("invalid path {0:?}: traversal segments are not allowed")]
    Traversal(String),

    /// The path was empty after normalisation
    #[error("invalid path {0:?}: no path segments")]
    Empty(String),
}

/// Normalises a logical path, rejecting traversal attempts.
///
/// Carriage returns and newlines are removed, leading slashes and empty
/// segments are dropped, and the remaining segments are rejoined with `/`.
///
/// # Errors
///
/// Returns [`PathError::Traversal`] if any segment is `.` or `..`, and
/// [`PathError::Empty`] if nothing remains after normalisation.
pub fn sanitize(path: &str) -> Result<String, PathError> {
    let cleaned: String = path.chars().filter(|c| *c != '\n' && *c != '\r').collect();

    let mut segments = Vec::new();
    for segment in cleaned.split('/') {
        if segment.is_empty() {
            continue;
        }
        if segment == "." || segment == ".." {
            return Err(PathError::Traversal(path.to_string()));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(PathError::Empty(path.to_string()));
    }

    Ok(segments.join("/"))
}

/// Normalises a listing prefix.
///
/// Same rules as [`sanitize`], except that an empty prefix is valid and
/// means "the whole store".
///
/// # Errors
///
/// Returns [`PathError::Traversal`] if any segment is `.` or `..`.
pub fn sanitize_prefix(prefix: &str) -> Result<String, PathError> {
    match sanitize(prefix) {
        Ok(p) => Ok(p),
        Err(PathError::Empty(_)) => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Joins a folder and a file name into a logical path.
///
/// An empty folder places the file at the store root.
pub fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder.trim_end_matches('/'), name)
    }
}
