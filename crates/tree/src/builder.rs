use crate::TreeError;
use cask_types::{FileNode, FileRef};
use std::collections::BTreeMap;

/// A slot in the accumulating trie: either a file leaf or a folder of
/// further slots. Ownership runs strictly parent-to-child.
#[derive(Debug)]
enum Slot {
    File(FileRef),
    Folder(BTreeMap<String, Slot>),
}

/// Builds a [`FileNode`] tree from a flat collection of [`FileRef`].
///
/// Construction has two phases: an accumulation phase
/// ([`add_file`](Self::add_file) / [`add_files`](Self::add_files), any
/// number of times, in any order) and a terminal [`build`](Self::build)
/// that freezes the structure and returns the root. The builder cannot be
/// used again after `build()`.
///
/// # Example
///
/// ```
/// use cask_tree::FileNodeBuilder;
/// # use cask_types::FileRef;
/// # use chrono::Utc;
/// # let file_ref = |path: &str| FileRef {
/// #     path: path.to_string(),
/// #     size: 1,
/// #     last_modified: Utc::now(),
/// #     content_type: None,
/// # };
/// let mut builder = FileNodeBuilder::from_name("root");
/// builder.add_files([file_ref("a/x"), file_ref("a/y"), file_ref("b/z")])?;
/// let tree = builder.build()?;
/// assert_eq!(tree.children.len(), 2); // folders "a" and "b"
/// # Ok::<(), cask_tree::TreeError>(())
/// ```
#[derive(Debug)]
pub struct FileNodeBuilder {
    root_name: String,
    root: BTreeMap<String, Slot>,
    built: bool,
}

impl FileNodeBuilder {
    /// Creates a builder whose eventual root node carries `name`.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            root_name: name.into(),
            root: BTreeMap::new(),
            built: false,
        }
    }

    /// Inserts one file reference, creating folder nodes for every path
    /// segment but the last and reusing folders that already exist.
    ///
    /// # Errors
    ///
    /// - [`TreeError::DuplicatePath`] if the exact path was already inserted
    /// - [`TreeError::InvalidPath`] if a segment already holds a file where
    ///   a folder is needed (or the reverse), or the path is empty
    /// - [`TreeError::IllegalState`] if [`build`](Self::build) was called
    pub fn add_file(&mut self, file_ref: FileRef) -> Result<&mut Self, TreeError> {
        if self.built {
            return Err(TreeError::IllegalState);
        }

        let segments: Vec<&str> = file_ref.path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, folders)) = segments.split_last() else {
            return Err(TreeError::InvalidPath {
                path: file_ref.path.clone(),
                reason: "no path segments",
            });
        };

        let mut current = &mut self.root;
        for segment in folders {
            let slot = current
                .entry((*segment).to_string())
                .or_insert_with(|| Slot::Folder(BTreeMap::new()));
            match slot {
                Slot::Folder(children) => current = children,
                Slot::File(_) => {
                    return Err(TreeError::InvalidPath {
                        path: file_ref.path.clone(),
                        reason: "a file already exists at an intermediate segment",
                    });
                }
            }
        }

        match current.get(*last) {
            Some(Slot::File(_)) => Err(TreeError::DuplicatePath(file_ref.path.clone())),
            Some(Slot::Folder(_)) => Err(TreeError::InvalidPath {
                path: file_ref.path.clone(),
                reason: "a folder already exists at this path",
            }),
            None => {
                current.insert((*last).to_string(), Slot::File(file_ref));
                Ok(self)
            }
        }
    }

    /// Inserts every file reference in `file_refs`.
    ///
    /// Stops at the first failing insertion; references inserted before the
    /// failure remain in the builder.
    pub fn add_files(
        &mut self,
        file_refs: impl IntoIterator<Item = FileRef>,
    ) -> Result<&mut Self, TreeError> {
        for file_ref in file_refs {
            self.add_file(file_ref)?;
        }
        Ok(self)
    }

    /// Freezes the accumulated structure and returns the root node.
    ///
    /// Children are ordered folders-first, then lexicographically by name,
    /// so the same set of references always produces the same tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IllegalState`] on any second call.
    pub fn build(&mut self) -> Result<FileNode, TreeError> {
        if self.built {
            return Err(TreeError::IllegalState);
        }
        self.built = true;
        let children = std::mem::take(&mut self.root);
        Ok(FileNode::folder(
            std::mem::take(&mut self.root_name),
            freeze(children),
        ))
    }
}

/// Converts a folder's slot map into ordered child nodes.
///
/// `BTreeMap` iteration is already lexicographic; two passes put folders
/// ahead of files.
fn freeze(slots: BTreeMap<String, Slot>) -> Vec<FileNode> {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for (name, slot) in slots {
        match slot {
            Slot::Folder(children) => folders.push(FileNode::folder(name, freeze(children))),
            Slot::File(file_ref) => files.push(FileNode::file(file_ref)),
        }
    }
    folders.extend(files);
    folders
}
