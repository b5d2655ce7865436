//! Content-addressed object model
//!
//! Blobs, tree nodes, commits and tags share one identity scheme: the
//! object's hash is MD5 over a canonical encoding of its logical contents,
//! scoped per repository. Identical contents collapse to one stored row.
//! All objects are immutable after construction; edits mint new objects.
//!
//! ## Canonical encodings
//!
//! ```text
//! blob   = type(3) ‖ check_sum ‖ Σ sorted(prop key ‖ prop value)
//! tree   = type(2) ‖ Σ name-sorted (entry.hash ‖ entry.name) ‖ Σ sorted props
//! commit = type(1) ‖ tree_hash ‖ Σ parent_hashes ‖ author ‖ committer ‖ message
//! tag    = type(4) ‖ target ‖ name ‖ tagger ‖ message
//! ```
//!
//! Property maps are iterated in lexicographic key order so the encoding is
//! stable across implementations. Signatures encode as
//! `name ‖ email ‖ unix-seconds (little-endian i64)`.

use crate::error::{Error, Result};
use crate::hash::{Hash, Hasher};
use crate::objects::file_mode::FileMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Object type discriminator, persisted alongside the tagged union.
///
/// Integer values match the original wire protocol and feed the canonical
/// hash as the leading type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    Commit = 1,
    Tree = 2,
    Blob = 3,
    Tag = 4,
}

impl ObjectType {
    pub fn as_i8(&self) -> i8 {
        *self as i8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
        }
    }
}

/// Extra attributes folded into an object's identity.
///
/// Currently just the file mode; kept as a map so the canonical encoding
/// stays stable if attributes are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub mode: FileMode,
}

impl Property {
    pub fn dir() -> Self {
        Property {
            mode: FileMode::Dir,
        }
    }

    pub fn regular() -> Self {
        Property {
            mode: FileMode::Regular,
        }
    }

    /// Key/value view in lexicographic key order.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("mode".to_string(), self.mode.as_str().to_string())])
    }

    fn write_to(&self, hasher: &mut Hasher) {
        for (key, value) in self.to_map() {
            hasher.write_string(&key);
            hasher.write_string(&value);
        }
    }
}

impl Default for Property {
    fn default() -> Self {
        Property::regular()
    }
}

/// A named child inside a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub is_dir: bool,
    pub hash: Hash,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, is_dir: bool, hash: Hash) -> Self {
        TreeEntry {
            name: name.into(),
            is_dir,
            hash,
        }
    }

    /// The anonymous entry standing in for a tree root.
    pub fn root(hash: Hash) -> Self {
        TreeEntry {
            name: String::new(),
            is_dir: true,
            hash,
        }
    }
}

/// Sort entries by byte-wise ascending name, the canonical tree order.
pub fn sort_entries(mut entries: Vec<TreeEntry>) -> Vec<TreeEntry> {
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    entries
}

/// Leaf object: file content identified by payload checksum and mode.
///
/// The payload itself lives in the blob adapter, keyed by `check_sum`; the
/// metadata row carries only identity and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub hash: Hash,
    pub repository_id: Uuid,
    pub check_sum: Hash,
    pub size: i64,
    pub properties: Property,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blob {
    pub fn new(repository_id: Uuid, properties: Property, check_sum: Hash, size: i64) -> Self {
        let mut hasher = Hasher::new();
        hasher.write_i8(ObjectType::Blob.as_i8());
        hasher.write_bytes(check_sum.as_bytes());
        properties.write_to(&mut hasher);

        let now = Utc::now();
        Blob {
            hash: hasher.finalize(),
            repository_id,
            check_sum,
            size,
            properties,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Internal object: a directory snapshot as a sorted list of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub hash: Hash,
    pub repository_id: Uuid,
    pub sub_objects: Vec<TreeEntry>,
    pub properties: Property,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TreeNode {
    /// Build a tree node from entries. Entries are sorted by name; duplicate
    /// names are rejected. A node with no entries is the empty tree and
    /// carries the well-known empty hash.
    pub fn new(
        repository_id: Uuid,
        properties: Property,
        sub_objects: Vec<TreeEntry>,
    ) -> Result<Self> {
        let sub_objects = sort_entries(sub_objects);
        for pair in sub_objects.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::Invalid(format!(
                    "duplicate tree entry: {}",
                    pair[0].name
                )));
            }
        }

        let hash = if sub_objects.is_empty() {
            Hash::empty()
        } else {
            let mut hasher = Hasher::new();
            hasher.write_i8(ObjectType::Tree.as_i8());
            for entry in &sub_objects {
                hasher.write_bytes(entry.hash.as_bytes());
                hasher.write_string(&entry.name);
            }
            properties.write_to(&mut hasher);
            hasher.finalize()
        };

        let now = Utc::now();
        Ok(TreeNode {
            hash,
            repository_id,
            sub_objects,
            properties,
            created_at: now,
            updated_at: now,
        })
    }

    /// The empty tree: empty hash, no entries.
    pub fn empty(repository_id: Uuid) -> Self {
        let now = Utc::now();
        TreeNode {
            hash: Hash::empty(),
            repository_id,
            sub_objects: Vec::new(),
            properties: Property::dir(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a direct child by name. Entries are sorted, so this is a
    /// binary search.
    pub fn sub_entry(&self, name: &str) -> Option<&TreeEntry> {
        self.sub_objects
            .binary_search_by(|entry| entry.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|index| &self.sub_objects[index])
    }
}

/// Author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

impl Signature {
    fn write_to(&self, hasher: &mut Hasher) {
        hasher.write_string(&self.name);
        hasher.write_string(&self.email);
        hasher.write_i64(self.when.timestamp());
    }
}

/// Immutable snapshot: a tree plus parentage and authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: Hash,
    pub repository_id: Uuid,
    pub author: Signature,
    pub committer: Signature,
    pub tree_hash: Hash,
    pub parent_hashes: Vec<Hash>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        repository_id: Uuid,
        author: Signature,
        committer: Signature,
        tree_hash: Hash,
        parent_hashes: Vec<Hash>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let mut hasher = Hasher::new();
        hasher.write_i8(ObjectType::Commit.as_i8());
        hasher.write_bytes(tree_hash.as_bytes());
        for parent in &parent_hashes {
            hasher.write_bytes(parent.as_bytes());
        }
        author.write_to(&mut hasher);
        committer.write_to(&mut hasher);
        hasher.write_string(&message);

        let now = Utc::now();
        Commit {
            hash: hasher.finalize(),
            repository_id,
            author,
            committer,
            tree_hash,
            parent_hashes,
            message,
            created_at: now,
            updated_at: now,
        }
    }

    /// Committer timestamp, the ordering key for history walks.
    pub fn committed_when(&self) -> DateTime<Utc> {
        self.committer.when
    }

    pub fn first_parent(&self) -> Option<&Hash> {
        self.parent_hashes.first()
    }
}

/// Annotated tag: a named pointer at a commit, itself content-addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub hash: Hash,
    pub repository_id: Uuid,
    pub name: String,
    pub target: Hash,
    pub tagger: Signature,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(
        repository_id: Uuid,
        name: impl Into<String>,
        target: Hash,
        tagger: Signature,
        message: Option<String>,
    ) -> Self {
        let name = name.into();
        let mut hasher = Hasher::new();
        hasher.write_i8(ObjectType::Tag.as_i8());
        hasher.write_bytes(target.as_bytes());
        hasher.write_string(&name);
        tagger.write_to(&mut hasher);
        if let Some(message) = &message {
            hasher.write_string(message);
        }

        let now = Utc::now();
        Tag {
            hash: hasher.finalize(),
            repository_id,
            name,
            target,
            tagger,
            message,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Tagged union over every content-addressed object, the unit the object
/// store persists and returns. Consumers match on the variant or use the
/// checked conversions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Object {
    Blob(Blob),
    Tree(TreeNode),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Blob(_) => ObjectType::Blob,
            Object::Tree(_) => ObjectType::Tree,
            Object::Commit(_) => ObjectType::Commit,
            Object::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn hash(&self) -> &Hash {
        match self {
            Object::Blob(blob) => &blob.hash,
            Object::Tree(tree) => &tree.hash,
            Object::Commit(commit) => &commit.hash,
            Object::Tag(tag) => &tag.hash,
        }
    }

    pub fn repository_id(&self) -> Uuid {
        match self {
            Object::Blob(blob) => blob.repository_id,
            Object::Tree(tree) => tree.repository_id,
            Object::Commit(commit) => commit.repository_id,
            Object::Tag(tag) => tag.repository_id,
        }
    }

    pub fn into_blob(self) -> Result<Blob> {
        match self {
            Object::Blob(blob) => Ok(blob),
            other => Err(Error::Invalid(format!(
                "expected blob, found {}",
                other.object_type().as_str()
            ))),
        }
    }

    pub fn into_tree(self) -> Result<TreeNode> {
        match self {
            Object::Tree(tree) => Ok(tree),
            other => Err(Error::Invalid(format!(
                "expected tree, found {}",
                other.object_type().as_str()
            ))),
        }
    }

    pub fn into_commit(self) -> Result<Commit> {
        match self {
            Object::Commit(commit) => Ok(commit),
            other => Err(Error::Invalid(format!(
                "expected commit, found {}",
                other.object_type().as_str()
            ))),
        }
    }

    pub fn into_tag(self) -> Result<Tag> {
        match self {
            Object::Tag(tag) => Ok(tag),
            other => Err(Error::Invalid(format!(
                "expected tag, found {}",
                other.object_type().as_str()
            ))),
        }
    }
}
