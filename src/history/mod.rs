//! Commit-graph algorithms: lazy commit nodes, traversal iterators, and
//! merge-base computation.

pub mod merge_base;
pub mod walk;

pub use merge_base::{independents, is_ancestor, merge_base};
pub use walk::{BfsIter, CommitFilter, CommitNode, DateOrderIter, FilterIter, PreorderIter, Visit};
