//! Commit-graph traversal
//!
//! [`CommitNode`] is a lazy view over the commit DAG: parents resolve
//! through the object store on demand. The iterators are pull-based
//! (`next().await`) with hash-set deduplication so merge-heavy DAGs visit
//! every commit once. `for_each` drives an iterator with a callback
//! returning [`Visit`]: `Continue` keeps walking, `Skip` prunes the current
//! node's parents, `Stop` ends the walk cleanly. Callback errors abort and
//! propagate.

use crate::error::Result;
use crate::hash::Hash;
use crate::objects::{Commit, TreeNode};
use crate::store::ObjectStore;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;

/// Flow control returned by `for_each` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// Do not descend into this commit's parents.
    Skip,
    /// End the walk; not an error.
    Stop,
}

/// Predicate over commits, used by [`FilterIter`].
pub type CommitFilter = Box<dyn Fn(&CommitNode) -> bool + Send + Sync>;

/// A commit plus the store needed to resolve its parents lazily.
#[derive(Clone)]
pub struct CommitNode {
    store: Arc<dyn ObjectStore>,
    commit: Commit,
}

impl CommitNode {
    pub fn new(store: Arc<dyn ObjectStore>, commit: Commit) -> Self {
        CommitNode { store, commit }
    }

    pub async fn load(store: Arc<dyn ObjectStore>, hash: &Hash) -> Result<Self> {
        let commit = store.commit(hash).await?;
        Ok(CommitNode { store, commit })
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    pub fn hash(&self) -> &Hash {
        &self.commit.hash
    }

    pub async fn parents(&self) -> Result<Vec<CommitNode>> {
        let mut parents = Vec::with_capacity(self.commit.parent_hashes.len());
        for hash in &self.commit.parent_hashes {
            parents.push(CommitNode::load(self.store.clone(), hash).await?);
        }
        Ok(parents)
    }

    /// The tree this commit snapshots; the empty hash resolves to the empty
    /// tree.
    pub async fn tree(&self) -> Result<TreeNode> {
        if self.commit.tree_hash.is_empty() {
            return Ok(TreeNode::empty(self.store.repository_id()));
        }
        self.store.tree_node(&self.commit.tree_hash).await
    }
}

impl std::fmt::Debug for CommitNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitNode")
            .field("hash", &self.commit.hash.to_hex())
            .field("parents", &self.commit.parent_hashes.len())
            .finish()
    }
}

/// Shared parent-expansion state: the last yielded node expands into the
/// frontier on the following `next`, unless the caller skipped it.
struct Pending {
    node: Option<CommitNode>,
    skip: bool,
}

impl Pending {
    fn new() -> Self {
        Pending {
            node: None,
            skip: false,
        }
    }

    fn set(&mut self, node: CommitNode) {
        self.node = Some(node);
        self.skip = false;
    }

    async fn take_parents(&mut self) -> Result<Vec<CommitNode>> {
        let node = self.node.take();
        let skip = std::mem::take(&mut self.skip);
        match node {
            Some(node) if !skip => node.parents().await,
            _ => Ok(Vec::new()),
        }
    }
}

/// Depth-first walk over parents, first parent first.
pub struct PreorderIter {
    stack: Vec<CommitNode>,
    visited: HashSet<Hash>,
    pending: Pending,
}

impl PreorderIter {
    pub fn new(start: CommitNode) -> Self {
        PreorderIter {
            stack: vec![start],
            visited: HashSet::new(),
            pending: Pending::new(),
        }
    }

    pub fn skip_parents(&mut self) {
        self.pending.skip = true;
    }

    pub async fn next(&mut self) -> Result<Option<CommitNode>> {
        // first parent pushed last so it pops first
        for parent in self.pending.take_parents().await?.into_iter().rev() {
            self.stack.push(parent);
        }
        while let Some(node) = self.stack.pop() {
            if !self.visited.insert(node.hash().clone()) {
                continue;
            }
            self.pending.set(node.clone());
            return Ok(Some(node));
        }
        Ok(None)
    }

    pub async fn for_each<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&CommitNode) -> Result<Visit>,
    {
        while let Some(node) = self.next().await? {
            match f(&node)? {
                Visit::Continue => {}
                Visit::Skip => self.skip_parents(),
                Visit::Stop => break,
            }
        }
        Ok(())
    }
}

/// Level-order walk over parents.
pub struct BfsIter {
    queue: VecDeque<CommitNode>,
    visited: HashSet<Hash>,
    pending: Pending,
}

impl BfsIter {
    pub fn new(start: CommitNode) -> Self {
        BfsIter {
            queue: VecDeque::from([start]),
            visited: HashSet::new(),
            pending: Pending::new(),
        }
    }

    pub fn skip_parents(&mut self) {
        self.pending.skip = true;
    }

    pub async fn next(&mut self) -> Result<Option<CommitNode>> {
        for parent in self.pending.take_parents().await? {
            self.queue.push_back(parent);
        }
        while let Some(node) = self.queue.pop_front() {
            if !self.visited.insert(node.hash().clone()) {
                continue;
            }
            self.pending.set(node.clone());
            return Ok(Some(node));
        }
        Ok(None)
    }

    pub async fn for_each<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&CommitNode) -> Result<Visit>,
    {
        while let Some(node) = self.next().await? {
            match f(&node)? {
                Visit::Continue => {}
                Visit::Skip => self.skip_parents(),
                Visit::Stop => break,
            }
        }
        Ok(())
    }
}

/// Heap entry ordered by committer time, ties broken by hash so the walk is
/// deterministic when clocks collide.
struct DateOrdered(CommitNode);

impl PartialEq for DateOrdered {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DateOrdered {}

impl PartialOrd for DateOrdered {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateOrdered {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .commit()
            .committed_when()
            .cmp(&other.0.commit().committed_when())
            .then_with(|| self.0.hash().cmp(other.0.hash()))
    }
}

/// Newest-first walk: the next node is popped from a max-heap keyed by
/// committer time.
pub struct DateOrderIter {
    heap: BinaryHeap<DateOrdered>,
    visited: HashSet<Hash>,
    pending: Pending,
}

impl DateOrderIter {
    pub fn new(start: CommitNode) -> Self {
        let mut heap = BinaryHeap::new();
        heap.push(DateOrdered(start));
        DateOrderIter {
            heap,
            visited: HashSet::new(),
            pending: Pending::new(),
        }
    }

    pub fn skip_parents(&mut self) {
        self.pending.skip = true;
    }

    pub async fn next(&mut self) -> Result<Option<CommitNode>> {
        for parent in self.pending.take_parents().await? {
            self.heap.push(DateOrdered(parent));
        }
        while let Some(DateOrdered(node)) = self.heap.pop() {
            if !self.visited.insert(node.hash().clone()) {
                continue;
            }
            self.pending.set(node.clone());
            return Ok(Some(node));
        }
        Ok(None)
    }

    pub async fn for_each<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&CommitNode) -> Result<Visit>,
    {
        while let Some(node) = self.next().await? {
            match f(&node)? {
                Visit::Continue => {}
                Visit::Skip => self.skip_parents(),
                Visit::Stop => break,
            }
        }
        Ok(())
    }
}

/// Level-order walk narrowed by predicates: `include` decides whether a
/// commit is yielded, `limit` stops descent past matching commits.
pub struct FilterIter {
    inner: BfsIter,
    include: Option<CommitFilter>,
    limit: Option<CommitFilter>,
}

impl FilterIter {
    pub fn new(
        start: CommitNode,
        include: Option<CommitFilter>,
        limit: Option<CommitFilter>,
    ) -> Self {
        FilterIter {
            inner: BfsIter::new(start),
            include,
            limit,
        }
    }

    pub fn skip_parents(&mut self) {
        self.inner.skip_parents();
    }

    pub async fn next(&mut self) -> Result<Option<CommitNode>> {
        loop {
            let Some(node) = self.inner.next().await? else {
                return Ok(None);
            };
            if self.limit.as_ref().is_some_and(|limit| limit(&node)) {
                self.inner.skip_parents();
            }
            if self.include.as_ref().is_none_or(|include| include(&node)) {
                return Ok(Some(node));
            }
        }
    }

    pub async fn for_each<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&CommitNode) -> Result<Visit>,
    {
        while let Some(node) = self.next().await? {
            match f(&node)? {
                Visit::Continue => {}
                Visit::Skip => self.skip_parents(),
                Visit::Stop => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::objects::{Object, Signature};
    use crate::store::{MemoryMetadata, MetadataStore};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use uuid::Uuid;

    /// Small DAG builder over the in-memory store. Commits get strictly
    /// increasing timestamps (an hour apart) unless a tie is forced.
    pub(crate) struct GraphBuilder {
        store: Arc<dyn ObjectStore>,
        repo: Uuid,
        commits: HashMap<String, Commit>,
        ticks: i64,
    }

    impl GraphBuilder {
        pub(crate) fn new() -> Self {
            let repo = Uuid::new_v4();
            GraphBuilder {
                store: MemoryMetadata::new().objects(repo),
                repo,
                commits: HashMap::new(),
                ticks: 0,
            }
        }

        pub(crate) fn store(&self) -> Arc<dyn ObjectStore> {
            self.store.clone()
        }

        pub(crate) async fn commit(&mut self, name: &str, parents: &[&str]) -> CommitNode {
            let tick = self.ticks;
            self.ticks += 1;
            self.commit_at(name, parents, tick).await
        }

        /// Add a commit with an explicit tick so tests can force timestamp
        /// ties.
        pub(crate) async fn commit_at(
            &mut self,
            name: &str,
            parents: &[&str],
            tick: i64,
        ) -> CommitNode {
            let when =
                Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap() + Duration::hours(tick);
            let signature = Signature::new("ann".to_string(), "ann@example.com".to_string(), when);
            let parent_hashes = parents
                .iter()
                .map(|p| self.commits[*p].hash.clone())
                .collect();
            let commit = Commit::new(
                self.repo,
                signature.clone(),
                signature,
                Hash::empty(),
                parent_hashes,
                name,
            );
            self.store
                .insert(Object::Commit(commit.clone()))
                .await
                .unwrap();
            self.commits.insert(name.to_string(), commit);
            self.node(name)
        }

        pub(crate) fn node(&self, name: &str) -> CommitNode {
            CommitNode::new(self.store.clone(), self.commits[name].clone())
        }

        pub(crate) fn name_of(&self, hash: &Hash) -> String {
            self.commits
                .iter()
                .find(|(_, commit)| &commit.hash == hash)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| hash.to_hex())
        }
    }

    async fn collect_names(graph: &GraphBuilder, mut iter: PreorderIter) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(node) = iter.next().await.unwrap() {
            names.push(graph.name_of(node.hash()));
        }
        names
    }

    #[tokio::test]
    async fn preorder_visits_first_parent_first() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await;
        graph.commit("b", &["a"]).await;
        graph.commit("c", &["a"]).await;
        graph.commit("m", &["b", "c"]).await;

        let names = collect_names(&graph, PreorderIter::new(graph.node("m"))).await;
        assert_eq!(names, vec!["m", "b", "a", "c"]);
    }

    #[tokio::test]
    async fn bfs_visits_level_order_and_deduplicates() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await;
        graph.commit("b", &["a"]).await;
        graph.commit("c", &["a"]).await;
        graph.commit("m", &["b", "c"]).await;

        let mut names = Vec::new();
        let mut iter = BfsIter::new(graph.node("m"));
        while let Some(node) = iter.next().await.unwrap() {
            names.push(graph.name_of(node.hash()));
        }
        // the diamond base appears exactly once
        assert_eq!(names, vec!["m", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn date_order_pops_newest_first_across_branches() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await; // t0
        graph.commit("b", &["a"]).await; // t1
        graph.commit("c", &["a"]).await; // t2
        graph.commit("d", &["b"]).await; // t3
        graph.commit("m", &["d", "c"]).await; // t4

        let mut names = Vec::new();
        let mut iter = DateOrderIter::new(graph.node("m"));
        while let Some(node) = iter.next().await.unwrap() {
            names.push(graph.name_of(node.hash()));
        }
        assert_eq!(names, vec!["m", "d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn for_each_stop_ends_cleanly() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await;
        graph.commit("b", &["a"]).await;
        graph.commit("c", &["b"]).await;

        let mut seen = 0;
        PreorderIter::new(graph.node("c"))
            .for_each(|_| {
                seen += 1;
                if seen == 2 {
                    return Ok(Visit::Stop);
                }
                Ok(Visit::Continue)
            })
            .await
            .unwrap();
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn for_each_skip_prunes_parents() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await;
        graph.commit("b", &["a"]).await;
        graph.commit("side", &[]).await;
        graph.commit("m", &["b", "side"]).await;

        let mut names = Vec::new();
        PreorderIter::new(graph.node("m"))
            .for_each(|node| {
                let name = graph.name_of(node.hash());
                let skip = name == "b";
                names.push(name);
                Ok(if skip { Visit::Skip } else { Visit::Continue })
            })
            .await
            .unwrap();
        // "a" is skipped because descent stopped at "b"
        assert_eq!(names, vec!["m", "b", "side"]);
    }

    #[tokio::test]
    async fn for_each_propagates_callback_errors() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await;

        let result = PreorderIter::new(graph.node("a"))
            .for_each(|_| Err(Error::Invalid("boom".to_string())))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn filter_iter_includes_and_limits() {
        let mut graph = GraphBuilder::new();
        graph.commit("a", &[]).await;
        graph.commit("b", &["a"]).await;
        graph.commit("c", &["b"]).await;
        graph.commit("d", &["c"]).await;

        let target = graph.node("b").hash().clone();
        let include: CommitFilter = {
            let target = target.clone();
            Box::new(move |node| node.hash() == &target)
        };
        let limit: CommitFilter = Box::new(move |node| node.hash() == &target);

        let mut iter = FilterIter::new(graph.node("d"), Some(include), Some(limit));
        let mut names = Vec::new();
        while let Some(node) = iter.next().await.unwrap() {
            names.push(graph.name_of(node.hash()));
        }
        // only "b" is yielded, and the walk never descends to "a"
        assert_eq!(names, vec!["b"]);
    }
}
