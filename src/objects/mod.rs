//! Content-addressed object model: hashes, modes, and the tagged union of
//! blobs, trees, commits and tags.

pub mod file_mode;
pub mod object;

pub use file_mode::FileMode;
pub use object::{
    Blob, Commit, Object, ObjectType, Property, Signature, Tag, TreeEntry, TreeNode, sort_entries,
};
