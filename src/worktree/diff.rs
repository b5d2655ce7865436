//! Merkle-trie diff between two trees
//!
//! Both trees keep their children name-sorted, so the diff is a
//! synchronized lockstep walk of the two child lists at every directory
//! level:
//!
//! - a name present on one side only flattens that subtree into per-leaf
//!   inserts or deletes;
//! - equal name and equal hash prunes the whole subtree (Merkle
//!   short-circuit);
//! - equal name, both directories: recurse;
//! - equal name, both blobs: a modify;
//! - a kind flip (blob vs directory) becomes the deletes of the old side
//!   followed by the inserts of the new.
//!
//! Applying the resulting change list to the left tree with
//! [`WorkTree::apply_one_change`](crate::worktree::WorkTree::apply_one_change)
//! reproduces the right tree; equal inputs produce no changes.

use crate::error::Result;
use crate::store::ObjectStore;
use crate::worktree::changes::{Change, ChangeEntry, Changes};
use crate::objects::{TreeEntry, TreeNode};
use futures::future::BoxFuture;
use std::cmp::Ordering;

pub async fn diff_trees(
    store: &dyn ObjectStore,
    from: &TreeNode,
    to: &TreeNode,
) -> Result<Changes> {
    let mut out = Vec::new();
    if from.hash != to.hash {
        diff_entries(
            store,
            String::new(),
            from.sub_objects.clone(),
            to.sub_objects.clone(),
            &mut out,
        )
        .await?;
    }
    Ok(Changes::new(out))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[derive(Clone, Copy)]
enum Side {
    Insert,
    Delete,
}

fn diff_entries<'a>(
    store: &'a dyn ObjectStore,
    prefix: String,
    from: Vec<TreeEntry>,
    to: Vec<TreeEntry>,
    out: &'a mut Vec<Change>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let mut i = 0;
        let mut j = 0;
        while i < from.len() || j < to.len() {
            let order = match (from.get(i), to.get(j)) {
                (Some(f), Some(t)) => f.name.as_bytes().cmp(t.name.as_bytes()),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };

            match order {
                Ordering::Less => {
                    flatten_subtree(store, &prefix, &from[i], Side::Delete, out).await?;
                    i += 1;
                }
                Ordering::Greater => {
                    flatten_subtree(store, &prefix, &to[j], Side::Insert, out).await?;
                    j += 1;
                }
                Ordering::Equal => {
                    let (f, t) = (&from[i], &to[j]);
                    if f.is_dir != t.is_dir {
                        flatten_subtree(store, &prefix, f, Side::Delete, out).await?;
                        flatten_subtree(store, &prefix, t, Side::Insert, out).await?;
                    } else if f.hash == t.hash {
                        // identical subtrees, prune
                    } else if f.is_dir {
                        let from_node = store.tree_node(&f.hash).await?;
                        let to_node = store.tree_node(&t.hash).await?;
                        diff_entries(
                            store,
                            join_path(&prefix, &f.name),
                            from_node.sub_objects,
                            to_node.sub_objects,
                            out,
                        )
                        .await?;
                    } else {
                        let path = join_path(&prefix, &f.name);
                        let from_blob = store.blob(&f.hash).await?;
                        let to_blob = store.blob(&t.hash).await?;
                        out.push(Change::modify(
                            path,
                            ChangeEntry::from_blob(&from_blob),
                            ChangeEntry::from_blob(&to_blob),
                        ));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        Ok(())
    })
}

/// Emit one change per leaf under `entry`, in name order.
fn flatten_subtree<'a>(
    store: &'a dyn ObjectStore,
    prefix: &'a str,
    entry: &'a TreeEntry,
    side: Side,
    out: &'a mut Vec<Change>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let path = join_path(prefix, &entry.name);
        if entry.is_dir {
            let node = store.tree_node(&entry.hash).await?;
            for child in &node.sub_objects {
                flatten_subtree(store, &path, child, side, out).await?;
            }
        } else {
            let blob = store.blob(&entry.hash).await?;
            let change_entry = ChangeEntry::from_blob(&blob);
            out.push(match side {
                Side::Insert => Change::insert(path, change_entry),
                Side::Delete => Change::delete(path, change_entry),
            });
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;
    use crate::objects::{Blob, Object, Property};
    use crate::store::{MemoryMetadata, MetadataStore};
    use crate::worktree::changes::ChangeAction;
    use std::sync::Arc;
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

        async fn blob(&self, seed: u8) -> Blob {
            let blob = Blob::new(
                self.repo,
                Property::regular(),
                Hash::new(vec![seed, seed + 1]),
                2,
            );
            self.store
                .insert(Object::Blob(blob.clone()))
                .await
                .unwrap()
                .into_blob()
                .unwrap()
        }

        async fn tree(&self, entries: Vec<TreeEntry>) -> TreeNode {
            let node = TreeNode::new(self.repo, Property::dir(), entries).unwrap();
            self.store
                .insert(Object::Tree(node.clone()))
                .await
                .unwrap()
                .into_tree()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn equal_trees_produce_no_changes() {
        let fx = Fixture::new();
        let blob = fx.blob(1).await;
        let tree = fx
            .tree(vec![TreeEntry::new("f.bin", false, blob.hash.clone())])
            .await;

        let changes = diff_trees(fx.store.as_ref(), &tree, &tree).await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn lockstep_classifies_insert_delete_modify() {
        let fx = Fixture::new();
        let kept = fx.blob(1).await;
        let old = fx.blob(2).await;
        let new = fx.blob(3).await;
        let added = fx.blob(4).await;

        let from = fx
            .tree(vec![
                TreeEntry::new("gone.bin", false, old.hash.clone()),
                TreeEntry::new("kept.bin", false, kept.hash.clone()),
                TreeEntry::new("mod.bin", false, old.hash.clone()),
            ])
            .await;
        let to = fx
            .tree(vec![
                TreeEntry::new("added.bin", false, added.hash.clone()),
                TreeEntry::new("kept.bin", false, kept.hash.clone()),
                TreeEntry::new("mod.bin", false, new.hash.clone()),
            ])
            .await;

        let changes = diff_trees(fx.store.as_ref(), &from, &to).await.unwrap();
        let summary: Vec<(ChangeAction, &str)> = changes
            .iter()
            .map(|c| (c.action, c.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeAction::Insert, "added.bin"),
                (ChangeAction::Delete, "gone.bin"),
                (ChangeAction::Modify, "mod.bin"),
            ]
        );
    }

    #[tokio::test]
    async fn one_sided_directory_flattens_to_leaves() {
        let fx = Fixture::new();
        let a = fx.blob(1).await;
        let b = fx.blob(2).await;
        let inner = fx
            .tree(vec![
                TreeEntry::new("a.bin", false, a.hash.clone()),
                TreeEntry::new("b.bin", false, b.hash.clone()),
            ])
            .await;
        let from = fx
            .tree(vec![TreeEntry::new("dir", true, inner.hash.clone())])
            .await;
        let to = TreeNode::empty(fx.repo);

        let changes = diff_trees(fx.store.as_ref(), &from, &to).await.unwrap();
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["dir/a.bin", "dir/b.bin"]);
        assert!(changes.iter().all(|c| c.action == ChangeAction::Delete));
    }

    #[tokio::test]
    async fn kind_flip_emits_delete_then_insert() {
        let fx = Fixture::new();
        let file = fx.blob(1).await;
        let nested = fx.blob(2).await;
        let inner = fx
            .tree(vec![TreeEntry::new("deep.bin", false, nested.hash.clone())])
            .await;

        let from = fx
            .tree(vec![TreeEntry::new("x", false, file.hash.clone())])
            .await;
        let to = fx
            .tree(vec![TreeEntry::new("x", true, inner.hash.clone())])
            .await;

        let changes = diff_trees(fx.store.as_ref(), &from, &to).await.unwrap();
        let summary: Vec<(ChangeAction, &str)> = changes
            .iter()
            .map(|c| (c.action, c.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeAction::Delete, "x"),
                (ChangeAction::Insert, "x/deep.bin"),
            ]
        );
    }
}
