//! Path-indexed Merkle rewriting over immutable trees
//!
//! A [`WorkTree`] is a view over one root tree in the object store. It never
//! mutates a stored node: every edit resolves the path, rewrites the spine
//! of directories bottom-up into freshly minted nodes, persists them, and
//! swaps the root. The resolved spine is an explicit structure
//! ([`ResolvedPath`]) so insert, replace and remove all share one rewrite
//! path.
//!
//! Paths are forward-slash form; [`clean_path`] normalizes separators,
//! trims whitespace and strips outer slashes. The empty path denotes the
//! root.

pub mod changes;
pub mod diff;

pub use changes::{Change, ChangeAction, ChangeEntry, Changes};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::objects::{Blob, Object, Property, TreeEntry, TreeNode};
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Normalize a user-supplied path: backslashes become forward slashes,
/// surrounding whitespace and outer slashes are stripped. Empty result
/// denotes the root.
pub fn clean_path(path: &str) -> String {
    path.replace('\\', "/")
        .trim()
        .trim_matches('/')
        .to_string()
}

/// A resolved step along a path: the entry seen in the parent plus the
/// object it references.
#[derive(Debug, Clone)]
pub struct FullObject {
    pub entry: TreeEntry,
    pub object: Object,
}

/// Outcome of walking a path from the root: the matched spine in order,
/// and whatever segments were missing past it.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPath {
    pub matched: Vec<FullObject>,
    pub missing: Vec<String>,
}

impl ResolvedPath {
    pub fn fully_matched(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Directory listing row: a tree entry augmented with blob size and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTreeEntry {
    pub name: String,
    pub is_dir: bool,
    pub hash: Hash,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a manifest walk: total payload size plus the matching paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeManifest {
    pub size: i64,
    pub file_list: Vec<String>,
}

/// The edit carried up the spine during a rewrite.
enum SpineEdit {
    /// Insert a new entry into the deepest existing directory
    Append(TreeEntry),
    /// Swap the named child for a rewritten one
    Replace(TreeEntry),
    /// Drop the named child; empties propagate as removals of the parent
    Remove(String),
}

pub struct WorkTree {
    store: Arc<dyn ObjectStore>,
    root: TreeNode,
}

impl WorkTree {
    /// Open a work tree at the given root entry. An empty hash opens the
    /// empty tree without touching the store.
    pub async fn new(store: Arc<dyn ObjectStore>, root: TreeEntry) -> Result<Self> {
        let root = if root.hash.is_empty() {
            TreeNode::empty(store.repository_id())
        } else {
            store.tree_node(&root.hash).await?
        };
        Ok(WorkTree { store, root })
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn root_hash(&self) -> &Hash {
        &self.root.hash
    }

    /// Walk `path` segment by segment from the root. Stops at the first
    /// missing segment; fails if an interior segment resolves to a blob.
    async fn resolve(&self, path: &str) -> Result<ResolvedPath> {
        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        let mut matched = Vec::new();
        let mut current = self.root.clone();

        for (index, segment) in segments.iter().enumerate() {
            let Some(entry) = current.sub_entry(segment).cloned() else {
                return Ok(ResolvedPath {
                    matched,
                    missing: segments[index..].to_vec(),
                });
            };

            if entry.is_dir {
                let node = self.store.tree_node(&entry.hash).await?;
                matched.push(FullObject {
                    entry,
                    object: Object::Tree(node.clone()),
                });
                current = node;
            } else {
                if index != segments.len() - 1 {
                    return Err(Error::BlobMustBeLeaf(segments[..=index].join("/")));
                }
                let blob = self.store.blob(&entry.hash).await?;
                matched.push(FullObject {
                    entry,
                    object: Object::Blob(blob),
                });
            }
        }

        Ok(ResolvedPath {
            matched,
            missing: Vec::new(),
        })
    }

    /// Apply one edit to `node` (known as `name` inside its parent), minting
    /// and persisting the rewritten node. Returns the edit to carry one
    /// level up, plus the minted node when one was produced.
    async fn apply_edit(
        &self,
        node: &TreeNode,
        name: &str,
        edit: SpineEdit,
    ) -> Result<(SpineEdit, Option<TreeNode>)> {
        let mut entries = node.sub_objects.clone();
        match edit {
            SpineEdit::Append(entry) => entries.push(entry),
            SpineEdit::Replace(entry) => {
                let position = entries
                    .iter()
                    .position(|e| e.name == entry.name)
                    .ok_or_else(|| Error::PathNotFound(entry.name.clone()))?;
                entries[position] = entry;
            }
            SpineEdit::Remove(target) => {
                entries.retain(|e| e.name != target);
                if entries.is_empty() {
                    // directory collapse: remove this node from its parent
                    return Ok((SpineEdit::Remove(name.to_string()), None));
                }
            }
        }

        let rewritten = TreeNode::new(self.store.repository_id(), node.properties, entries)?;
        let stored = self
            .store
            .insert(Object::Tree(rewritten))
            .await?
            .into_tree()?;
        let carry = SpineEdit::Replace(TreeEntry::new(name, true, stored.hash.clone()));
        Ok((carry, Some(stored)))
    }

    /// Rewrite the matched spine bottom-up, starting with `edit` at the
    /// deepest directory and ending at the root.
    async fn rewrite_spine(&mut self, spine: &[FullObject], edit: SpineEdit) -> Result<()> {
        let mut carry = edit;
        for level in spine.iter().rev() {
            let Object::Tree(node) = &level.object else {
                return Err(Error::BlobMustBeLeaf(level.entry.name.clone()));
            };
            let (next, _) = self.apply_edit(node, &level.entry.name, carry).await?;
            carry = next;
        }

        let root = self.root.clone();
        let (_, minted) = self.apply_edit(&root, "", carry).await?;
        self.root = minted.unwrap_or_else(|| TreeNode::empty(self.store.repository_id()));
        Ok(())
    }

    /// Insert a new leaf, creating missing directories along the way. Fails
    /// `EntryExists` if the path is already present.
    pub async fn add_leaf(&mut self, path: &str, blob: &Blob) -> Result<()> {
        let path = clean_path(path);
        if path.is_empty() {
            return Err(Error::Invalid("empty path".to_string()));
        }

        let resolved = self.resolve(&path).await?;
        if resolved.fully_matched() {
            return Err(Error::EntryExists(path));
        }
        if resolved.missing.iter().any(String::is_empty) {
            return Err(Error::Invalid(format!("empty path segment in {path:?}")));
        }

        self.store.insert(Object::Blob(blob.clone())).await?;

        // synthesize the missing chain right to left, deepest entry first
        let (leaf_name, missing_dirs) = resolved
            .missing
            .split_last()
            .ok_or_else(|| Error::EntryExists(path.clone()))?;
        let mut entry = TreeEntry::new(leaf_name.clone(), false, blob.hash.clone());
        for segment in missing_dirs.iter().rev() {
            let node = TreeNode::new(
                self.store.repository_id(),
                Property::dir(),
                vec![entry],
            )?;
            let stored = self.store.insert(Object::Tree(node)).await?.into_tree()?;
            entry = TreeEntry::new(segment.clone(), true, stored.hash);
        }

        self.rewrite_spine(&resolved.matched, SpineEdit::Append(entry))
            .await
    }

    /// Replace an existing leaf with a new blob, rewriting only the spine.
    pub async fn replace_leaf(&mut self, path: &str, blob: &Blob) -> Result<()> {
        let path = clean_path(path);
        let resolved = self.resolve(&path).await?;
        if !resolved.fully_matched() {
            return Err(Error::PathNotFound(path));
        }
        let Some((leaf, spine)) = resolved.matched.split_last() else {
            return Err(Error::PathNotFound(path));
        };
        if leaf.entry.is_dir {
            return Err(Error::PathNotFound(path));
        }

        self.store.insert(Object::Blob(blob.clone())).await?;

        let entry = TreeEntry::new(leaf.entry.name.clone(), false, blob.hash.clone());
        self.rewrite_spine(spine, SpineEdit::Replace(entry)).await
    }

    /// Remove the entry at `path` (a file or a whole directory). Parents
    /// left empty collapse away; removing the last entry yields the empty
    /// tree.
    pub async fn remove_entry(&mut self, path: &str) -> Result<()> {
        let path = clean_path(path);
        let resolved = self.resolve(&path).await?;
        if !resolved.fully_matched() {
            return Err(Error::PathNotFound(path));
        }
        let Some((leaf, spine)) = resolved.matched.split_last() else {
            return Err(Error::PathNotFound(path));
        };

        self.rewrite_spine(spine, SpineEdit::Remove(leaf.entry.name.clone()))
            .await
    }

    /// List the children of a directory. The empty pattern lists the root.
    pub async fn ls(&self, pattern: &str) -> Result<Vec<FullTreeEntry>> {
        let path = clean_path(pattern);
        if path.is_empty() {
            return self.full_entries(&self.root.sub_objects).await;
        }

        let resolved = self.resolve(&path).await?;
        if !resolved.fully_matched() {
            return Err(Error::PathNotFound(path));
        }
        let Some(last) = resolved.matched.last() else {
            return Err(Error::PathNotFound(path));
        };
        match &last.object {
            Object::Tree(node) => self.full_entries(&node.sub_objects).await,
            _ => Err(Error::NotDirectory(path)),
        }
    }

    async fn full_entries(&self, entries: &[TreeEntry]) -> Result<Vec<FullTreeEntry>> {
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_dir {
                let node = self.store.tree_node(&entry.hash).await?;
                rows.push(FullTreeEntry {
                    name: entry.name.clone(),
                    is_dir: true,
                    hash: entry.hash.clone(),
                    size: 0,
                    created_at: node.created_at,
                    updated_at: node.updated_at,
                });
            } else {
                let blob = self.store.blob(&entry.hash).await?;
                rows.push(FullTreeEntry {
                    name: entry.name.clone(),
                    is_dir: false,
                    hash: entry.hash.clone(),
                    size: blob.size,
                    created_at: blob.created_at,
                    updated_at: blob.updated_at,
                });
            }
        }
        Ok(rows)
    }

    /// Resolve a path to its blob. Fails `PathNotFound` on directories.
    pub async fn find_blob(&self, path: &str) -> Result<(Blob, String)> {
        let path = clean_path(path);
        let resolved = self.resolve(&path).await?;
        if !resolved.fully_matched() {
            return Err(Error::PathNotFound(path));
        }
        let Some(last) = resolved.matched.last() else {
            return Err(Error::PathNotFound(path));
        };
        match &last.object {
            Object::Blob(blob) => Ok((blob.clone(), last.entry.name.clone())),
            _ => Err(Error::PathNotFound(path)),
        }
    }

    /// Walk every file depth-first and collect the paths matching the glob
    /// (an empty pattern selects every file), along with their total size.
    pub async fn get_tree_manifest(&self, pattern: &str) -> Result<TreeManifest> {
        let pattern = clean_path(pattern);
        let matcher = if pattern.is_empty() {
            None
        } else {
            Some(
                glob::Pattern::new(&pattern)
                    .map_err(|err| Error::Invalid(format!("glob {pattern:?}: {err}")))?,
            )
        };

        let mut manifest = TreeManifest::default();
        // stack of (parent path, entry); children pushed in reverse so the
        // walk emits name order
        let mut stack: Vec<(String, TreeEntry)> = self
            .root
            .sub_objects
            .iter()
            .rev()
            .map(|entry| (String::new(), entry.clone()))
            .collect();

        while let Some((prefix, entry)) = stack.pop() {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}/{}", entry.name)
            };
            if entry.is_dir {
                let node = self.store.tree_node(&entry.hash).await?;
                for child in node.sub_objects.into_iter().rev() {
                    stack.push((path.clone(), child));
                }
            } else if matcher.as_ref().is_none_or(|m| m.matches(&path)) {
                let blob = self.store.blob(&entry.hash).await?;
                manifest.size += blob.size;
                manifest.file_list.push(path);
            }
        }

        Ok(manifest)
    }

    /// Diff this tree against another root, keeping only changes under the
    /// given prefix.
    pub async fn diff(&self, other_root: &Hash, prefix: &str) -> Result<Changes> {
        let to = if other_root.is_empty() {
            TreeNode::empty(self.store.repository_id())
        } else {
            self.store.tree_node(other_root).await?
        };
        let changes = diff::diff_trees(self.store.as_ref(), &self.root, &to).await?;
        Ok(changes.filter_prefix(&clean_path(prefix)))
    }

    /// Replay one change onto this tree: insert adds the referenced blob,
    /// modify replaces it, delete removes the path.
    pub async fn apply_one_change(&mut self, change: &Change) -> Result<()> {
        match change.action {
            ChangeAction::Insert => {
                let entry = change
                    .to
                    .as_ref()
                    .ok_or_else(|| Error::Invalid("insert change without target".to_string()))?;
                let blob = self.store.blob(&entry.hash).await?;
                self.add_leaf(&change.path, &blob).await
            }
            ChangeAction::Modify => {
                let entry = change
                    .to
                    .as_ref()
                    .ok_or_else(|| Error::Invalid("modify change without target".to_string()))?;
                let blob = self.store.blob(&entry.hash).await?;
                self.replace_leaf(&change.path, &blob).await
            }
            ChangeAction::Delete => self.remove_entry(&change.path).await,
        }
    }

    /// Replay the inverse of a change, undoing it.
    pub async fn apply_inverse(&mut self, change: &Change) -> Result<()> {
        self.apply_one_change(&change.invert()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{MemoryMetadata, MetadataStore};
    use rstest::rstest;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<dyn ObjectStore>,
        repo: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = Uuid::new_v4();
            Fixture {
                store: MemoryMetadata::new().objects(repo),
                repo,
            }
        }

        async fn empty_tree(&self) -> WorkTree {
            WorkTree::new(self.store.clone(), TreeEntry::root(Hash::empty()))
                .await
                .unwrap()
        }

        fn blob(&self, seed: &[u8]) -> Blob {
            Blob::new(
                self.repo,
                Property::regular(),
                Hash::new(seed.to_vec()),
                seed.len() as i64,
            )
        }
    }

    #[rstest]
    #[case(r"a\b\c", "a/b/c")]
    #[case("  /a/b/  ", "a/b")]
    #[case("/a/b.bin", "a/b.bin")]
    #[case("///", "")]
    #[case("", "")]
    fn clean_path_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_path(input), expected);
    }

    #[tokio::test]
    async fn add_leaf_at_depth_one() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("f.bin", &fx.blob(b"1")).await.unwrap();

        assert!(!tree.root_hash().is_empty());
        let listing = tree.ls("").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "f.bin");
        assert!(!listing[0].is_dir);
        assert_eq!(listing[0].size, 1);
    }

    #[tokio::test]
    async fn add_leaf_synthesizes_missing_directories() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b/c.bin", &fx.blob(b"abc")).await.unwrap();

        let top = tree.ls("").await.unwrap();
        assert_eq!(top[0].name, "a");
        assert!(top[0].is_dir);

        let inner = tree.ls("a/b").await.unwrap();
        assert_eq!(inner[0].name, "c.bin");

        // siblings merge into the existing spine instead of a new chain
        tree.add_leaf("a/b/d.bin", &fx.blob(b"d")).await.unwrap();
        let inner = tree.ls("a/b").await.unwrap();
        let names: Vec<_> = inner.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c.bin", "d.bin"]);
    }

    #[tokio::test]
    async fn add_leaf_on_existing_path_fails() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"1")).await.unwrap();

        let err = tree.add_leaf("a/b.bin", &fx.blob(b"2")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn interior_blob_is_rejected() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"1")).await.unwrap();

        let err = tree
            .add_leaf("a/b.bin/nested", &fx.blob(b"2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BlobMustBeLeaf(_)));
    }

    #[tokio::test]
    async fn replace_leaf_rewrites_spine_only() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"old")).await.unwrap();
        let before = tree.root_hash().clone();

        tree.replace_leaf("a/b.bin", &fx.blob(b"new")).await.unwrap();
        assert_ne!(tree.root_hash(), &before);

        let (blob, name) = tree.find_blob("a/b.bin").await.unwrap();
        assert_eq!(name, "b.bin");
        assert_eq!(blob.check_sum.as_bytes(), b"new");
    }

    #[tokio::test]
    async fn replace_leaf_requires_existing_blob() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"1")).await.unwrap();

        let err = tree
            .replace_leaf("a/missing.bin", &fx.blob(b"2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // a directory is not a replaceable leaf
        let err = tree.replace_leaf("a", &fx.blob(b"2")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn remove_collapses_empty_ancestors() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("x/y/z.txt", &fx.blob(b"z")).await.unwrap();

        tree.remove_entry("x/y/z.txt").await.unwrap();
        assert!(tree.root_hash().is_empty());
        assert!(tree.ls("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_directory_drops_subtree() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b/c.txt", &fx.blob(b"c")).await.unwrap();
        tree.add_leaf("a/b/d.txt", &fx.blob(b"d")).await.unwrap();
        tree.add_leaf("keep.txt", &fx.blob(b"k")).await.unwrap();

        tree.remove_entry("a/b").await.unwrap();
        let listing = tree.ls("").await.unwrap();
        let names: Vec<_> = listing.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["keep.txt"]);
    }

    #[tokio::test]
    async fn add_then_remove_restores_root_hash() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("keep.bin", &fx.blob(b"k")).await.unwrap();
        let before = tree.root_hash().clone();

        tree.add_leaf("a/b.bin", &fx.blob(b"b")).await.unwrap();
        assert_ne!(tree.root_hash(), &before);

        tree.remove_entry("a/b.bin").await.unwrap();
        assert_eq!(tree.root_hash(), &before);
    }

    #[tokio::test]
    async fn ls_failure_modes() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"1")).await.unwrap();

        let err = tree.ls("a/b.bin").await.unwrap_err();
        assert!(matches!(err, Error::NotDirectory(_)));

        let err = tree.ls("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn manifest_matches_glob() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("data/a.csv", &fx.blob(b"aa")).await.unwrap();
        tree.add_leaf("data/b.bin", &fx.blob(b"b")).await.unwrap();
        tree.add_leaf("top.csv", &fx.blob(b"ttt")).await.unwrap();

        let manifest = tree.get_tree_manifest("*.csv").await.unwrap();
        assert_eq!(manifest.file_list, vec!["data/a.csv", "top.csv"]);
        assert_eq!(manifest.size, 5);

        let all = tree.get_tree_manifest("").await.unwrap();
        assert_eq!(all.file_list.len(), 3);
    }

    #[tokio::test]
    async fn diff_of_identical_roots_is_empty() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"1")).await.unwrap();

        let changes = tree.diff(&tree.root_hash().clone(), "").await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn applying_diff_reproduces_target_tree() {
        let fx = Fixture::new();

        let mut from = fx.empty_tree().await;
        from.add_leaf("shared/a.bin", &fx.blob(b"a")).await.unwrap();
        from.add_leaf("shared/b.bin", &fx.blob(b"b")).await.unwrap();
        from.add_leaf("only-old/c.bin", &fx.blob(b"c")).await.unwrap();

        let mut to = fx.empty_tree().await;
        to.add_leaf("shared/a.bin", &fx.blob(b"a")).await.unwrap();
        to.add_leaf("shared/b.bin", &fx.blob(b"b2")).await.unwrap();
        to.add_leaf("fresh/d/e.bin", &fx.blob(b"e")).await.unwrap();

        let changes = from.diff(&to.root_hash().clone(), "").await.unwrap();
        assert!(!changes.is_empty());

        let mut replay = WorkTree::new(
            fx.store.clone(),
            TreeEntry::root(from.root_hash().clone()),
        )
        .await
        .unwrap();
        for change in changes.iter() {
            replay.apply_one_change(change).await.unwrap();
        }
        assert_eq!(replay.root_hash(), to.root_hash());
    }

    #[tokio::test]
    async fn diff_prefix_filters_changes() {
        let fx = Fixture::new();
        let mut from = fx.empty_tree().await;
        from.add_leaf("a/one.bin", &fx.blob(b"1")).await.unwrap();
        from.add_leaf("b/two.bin", &fx.blob(b"2")).await.unwrap();

        let to = fx.empty_tree().await;
        let changes = from.diff(&to.root_hash().clone(), "a").await.unwrap();
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a/one.bin"]);
    }

    #[tokio::test]
    async fn inverse_change_undoes_an_edit() {
        let fx = Fixture::new();
        let mut tree = fx.empty_tree().await;
        tree.add_leaf("a/b.bin", &fx.blob(b"base")).await.unwrap();
        let base = tree.root_hash().clone();

        tree.replace_leaf("a/b.bin", &fx.blob(b"edited")).await.unwrap();

        // diff from the base viewpoint: base -> current is a single modify
        let base_view = WorkTree::new(fx.store.clone(), TreeEntry::root(base.clone()))
            .await
            .unwrap();
        let changes = base_view.diff(&tree.root_hash().clone(), "").await.unwrap();
        assert_eq!(changes.len(), 1);

        for change in changes.iter() {
            tree.apply_inverse(change).await.unwrap();
        }
        assert_eq!(tree.root_hash(), &base);
    }
}
