//! Change model between two trees
//!
//! A diff reduces to an ordered list of leaf-level changes. Each change
//! names the path, the action, and the blob on either side; this is also
//! the wire shape surfaced to callers:
//!
//! ```json
//! { "action": "modify",
//!   "path": "a/b.bin",
//!   "from": { "hash": "…", "is_dir": false, "mode": "100644" },
//!   "to":   { "hash": "…", "is_dir": false, "mode": "100644" } }
//! ```

use crate::hash::Hash;
use crate::objects::{Blob, FileMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Delete,
    Modify,
}

/// One side of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub hash: Hash,
    pub is_dir: bool,
    pub mode: FileMode,
}

impl ChangeEntry {
    pub fn from_blob(blob: &Blob) -> Self {
        ChangeEntry {
            hash: blob.hash.clone(),
            is_dir: false,
            mode: blob.properties.mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: ChangeAction,
    pub path: String,
    pub from: Option<ChangeEntry>,
    pub to: Option<ChangeEntry>,
}

impl Change {
    pub fn insert(path: impl Into<String>, to: ChangeEntry) -> Self {
        Change {
            action: ChangeAction::Insert,
            path: path.into(),
            from: None,
            to: Some(to),
        }
    }

    pub fn delete(path: impl Into<String>, from: ChangeEntry) -> Self {
        Change {
            action: ChangeAction::Delete,
            path: path.into(),
            from: Some(from),
            to: None,
        }
    }

    pub fn modify(path: impl Into<String>, from: ChangeEntry, to: ChangeEntry) -> Self {
        Change {
            action: ChangeAction::Modify,
            path: path.into(),
            from: Some(from),
            to: Some(to),
        }
    }

    /// The change that undoes this one.
    pub fn invert(&self) -> Change {
        match self.action {
            ChangeAction::Insert => Change {
                action: ChangeAction::Delete,
                path: self.path.clone(),
                from: self.to.clone(),
                to: None,
            },
            ChangeAction::Delete => Change {
                action: ChangeAction::Insert,
                path: self.path.clone(),
                from: None,
                to: self.from.clone(),
            },
            ChangeAction::Modify => Change {
                action: ChangeAction::Modify,
                path: self.path.clone(),
                from: self.to.clone(),
                to: self.from.clone(),
            },
        }
    }

    /// Hash of the resulting side; `None` for a delete.
    pub fn to_hash(&self) -> Option<&Hash> {
        self.to.as_ref().map(|entry| &entry.hash)
    }
}

/// Ordered list of changes between two trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes(Vec<Change>);

impl Changes {
    pub fn new(changes: Vec<Change>) -> Self {
        Changes(changes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Change> {
        self.0
    }

    /// Look up the change touching `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Change> {
        self.0.iter().find(|change| change.path == path)
    }

    /// Keep only changes under the given path prefix. An empty prefix keeps
    /// everything; otherwise a change survives when its path equals the
    /// prefix or lives below it.
    pub fn filter_prefix(self, prefix: &str) -> Changes {
        if prefix.is_empty() {
            return self;
        }
        let nested = format!("{prefix}/");
        Changes(
            self.0
                .into_iter()
                .filter(|change| change.path == prefix || change.path.starts_with(&nested))
                .collect(),
        )
    }
}

impl IntoIterator for Changes {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
