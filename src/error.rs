//! Error taxonomy for the versioning engine
//!
//! Every fallible operation in the crate returns one of these kinds. The
//! boundary layer maps kinds to transport status codes via [`Error::kind`];
//! `StaleBase` and `Transient` are the retryable kinds, and retries are
//! always caller-driven.

use thiserror::Error;

/// Coarse classification of an error, used by boundary layers to pick a
/// status code without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Conflict,
    StaleBase,
    Invalid,
    Forbidden,
    Transient,
}

/// Error type for all engine operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A path segment was missing where presence is required
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// AddLeaf on a fully existing path
    #[error("entry exists: {0}")]
    EntryExists(String),

    /// An interior path segment resolved to a blob
    #[error("blob must be leaf: {0}")]
    BlobMustBeLeaf(String),

    /// Ls on a blob terminal
    #[error("path must be a directory: {0}")]
    NotDirectory(String),

    /// Repository / branch / tag / commit / WIP / object missing
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Duplicate branch name, duplicate repository, ...
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// Upload to an occupied path without replace, or an unmergeable state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Three-way merge found paths changed incompatibly on both sides
    #[error("merge conflict on {} path(s): {}", .paths.len(), .paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    /// Optimistic-concurrency guard failed on a branch or WIP update
    #[error("stale base: expected {expected}, found {actual}")]
    StaleBase { expected: String, actual: String },

    /// Bad hex hash, empty name segment, malformed input
    #[error("invalid {0}")]
    Invalid(String),

    /// Propagated from the external authorization layer
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Blob adapter or metadata store I/O failure
    #[error("storage failure: {0}")]
    Transient(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PathNotFound(_) | Error::NotFound { .. } => ErrorKind::NotFound,
            Error::EntryExists(_) | Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::Conflict(_) | Error::MergeConflict { .. } => ErrorKind::Conflict,
            Error::StaleBase { .. } => ErrorKind::StaleBase,
            Error::BlobMustBeLeaf(_)
            | Error::NotDirectory(_)
            | Error::Invalid(_) => ErrorKind::Invalid,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Transient(_) => ErrorKind::Transient,
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind,
            name: name.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transient(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_worktree_failures_onto_taxonomy() {
        assert_eq!(
            Error::PathNotFound("a/b".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::EntryExists("a/b".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            Error::BlobMustBeLeaf("a".into()).kind(),
            ErrorKind::Invalid
        );
        assert_eq!(Error::NotDirectory("a".into()).kind(), ErrorKind::Invalid);
    }

    #[test]
    fn merge_conflict_lists_paths() {
        let err = Error::MergeConflict {
            paths: vec!["a/b.bin".into(), "c.bin".into()],
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("a/b.bin"));
        assert!(err.to_string().contains("2 path(s)"));
    }
}
