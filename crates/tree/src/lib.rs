//! Flat-to-tree projection of file listings.
//!
//! A store's `list_files` returns a flat sequence of [`cask_types::FileRef`]
//! values. [`FileNodeBuilder`] folds such a sequence into a single-rooted
//! [`cask_types::FileNode`] tree for hierarchical display: each path is
//! split on `/` and inserted trie-style, merging shared folder prefixes.
//!
//! The resulting tree is deterministic regardless of insertion order:
//! within any node, folders come before files and each group is sorted
//! lexicographically by name.

mod builder;

pub use builder::FileNodeBuilder;

/// Errors raised while building a file tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The same full path was inserted twice
    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    /// A path segment would have to be both a file and a folder,
    /// or the path had no segments at all
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// The builder was used after `build()`
    #[error("builder already finalised")]
    IllegalState,
}
