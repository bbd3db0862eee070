//! Shared data model for the cask file storage crates.
//!
//! This crate defines the two types that cross crate boundaries:
//!
//! - [`FileRef`]: a stored file's identity and metadata, as returned by a
//!   store's write and list operations
//! - [`FileNode`]: a node in the presentation tree built from a flat file
//!   listing
//!
//! It also provides [`path`], the logical-path sanitisation rules shared by
//! every storage backend. Logical paths are store-relative, slash-separated
//! keys; they are never interpreted as native filesystem paths.

mod node;
pub mod path;
mod reference;

pub use node::FileNode;
pub use path::PathError;
pub use reference::FileRef;
