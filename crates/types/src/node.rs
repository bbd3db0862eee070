use crate::FileRef;

/// A node in the presentation tree built from a flat file listing.
///
/// Leaves with `is_file == true` carry the [`FileRef`] they were built from;
/// every other node is a folder. Within any node's `children`, names are
/// unique, folders come before files, and each group is sorted
/// lexicographically. A folder node exists only because at least one file
/// path passes through it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileNode {
    /// Single path segment, unique among siblings
    pub name: String,

    /// Whether this node is a file (leaf) or a folder
    pub is_file: bool,

    /// The file reference, present iff `is_file`
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none", default)]
    pub file_ref: Option<FileRef>,

    /// Child nodes, empty for files
    #[serde(default)]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Creates a folder node with the given children.
    pub fn folder(name: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            name: name.into(),
            is_file: false,
            file_ref: None,
            children,
        }
    }

    /// Creates a file node from a reference, named by its last path segment.
    pub fn file(file_ref: FileRef) -> Self {
        Self {
            name: file_ref.name().to_string(),
            is_file: true,
            file_ref: Some(file_ref),
            children: Vec::new(),
        }
    }
}
