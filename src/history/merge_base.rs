//! Merge-base computation
//!
//! `merge_base(a, b)` returns the best common ancestors of two commits,
//! with git semantics: a best common ancestor is any common ancestor that
//! is not an ancestor of another common ancestor.
//!
//! The walk starts from the newer of the two commits (committer date
//! descending, ties broken by hash so the result is deterministic), indexes
//! its history, fast-exits when the older commit turns out to be reachable,
//! then collects the older side's commits that land inside the index and
//! reduces them to the independent subset.

use crate::error::Result;
use crate::hash::Hash;
use crate::history::walk::{BfsIter, CommitFilter, CommitNode, FilterIter, PreorderIter, Visit};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Best common ancestors of `a` and `b`. Empty when the histories are
/// unrelated.
pub async fn merge_base(a: &CommitNode, b: &CommitNode) -> Result<Vec<CommitNode>> {
    let mut sorted = sort_by_commit_date_desc(vec![a.clone(), b.clone()]);
    let older = sorted.pop().unwrap_or_else(|| a.clone());
    let newer = sorted.pop().unwrap_or_else(|| b.clone());

    let Some(newer_history) = ancestors_index(&older, &newer).await? else {
        // the older commit is reachable from the newer one
        return Ok(vec![older]);
    };

    let index = Arc::new(newer_history);
    let include: CommitFilter = {
        let index = index.clone();
        Box::new(move |node| index.contains(node.hash()))
    };
    let limit: CommitFilter = {
        let index = index.clone();
        Box::new(move |node| index.contains(node.hash()))
    };

    let mut candidates = Vec::new();
    let mut iter = FilterIter::new(older, Some(include), Some(limit));
    while let Some(node) = iter.next().await? {
        candidates.push(node);
    }

    independents(candidates).await
}

/// True when `a` is an ancestor of (or equal to) `b`.
pub async fn is_ancestor(a: &CommitNode, b: &CommitNode) -> Result<bool> {
    let mut found = false;
    let target = a.hash().clone();
    PreorderIter::new(b.clone())
        .for_each(|node| {
            if node.hash() == &target {
                found = true;
                return Ok(Visit::Stop);
            }
            Ok(Visit::Continue)
        })
        .await?;
    Ok(found)
}

/// Index the history of `starting`, unless `excluded` is reachable from it
/// (`None` signals reachability, the caller's fast path).
async fn ancestors_index(
    excluded: &CommitNode,
    starting: &CommitNode,
) -> Result<Option<HashSet<Hash>>> {
    if excluded.hash() == starting.hash() {
        return Ok(None);
    }

    let mut history = HashSet::new();
    let mut reachable = false;
    let excluded_hash = excluded.hash().clone();
    BfsIter::new(starting.clone())
        .for_each(|node| {
            if node.hash() == &excluded_hash {
                reachable = true;
                return Ok(Visit::Stop);
            }
            history.insert(node.hash().clone());
            Ok(Visit::Continue)
        })
        .await?;

    if reachable {
        Ok(None)
    } else {
        Ok(Some(history))
    }
}

/// Reduce `commits` to the subset where no element is reachable from
/// another. Walks each candidate's history, pruning candidates that appear
/// in it; already-walked territory is skipped via the shared `seen` set.
pub async fn independents(commits: Vec<CommitNode>) -> Result<Vec<CommitNode>> {
    let mut candidates = remove_duplicates(sort_by_commit_date_desc(commits));
    if candidates.len() < 2 {
        return Ok(candidates);
    }

    let seen: Arc<Mutex<HashSet<Hash>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut pos = 0;
    loop {
        let from = candidates[pos].clone();
        let from_hash = from.hash().clone();

        let limit: CommitFilter = {
            let seen = seen.clone();
            Box::new(move |node| {
                seen.lock()
                    .map(|s| s.contains(node.hash()))
                    .unwrap_or(false)
            })
        };

        let mut iter = FilterIter::new(from.clone(), None, Some(limit));
        while let Some(ancestor) = iter.next().await? {
            // the walk includes `from` itself; only other candidates that
            // show up in its history are redundant
            candidates
                .retain(|c| c.hash() == &from_hash || c.hash() != ancestor.hash());
            if candidates.len() == 1 {
                break;
            }
            if let Ok(mut s) = seen.lock() {
                s.insert(ancestor.hash().clone());
            }
        }

        let next_pos = candidates
            .iter()
            .position(|c| c.hash() == &from_hash)
            .map(|index| index + 1)
            .unwrap_or(candidates.len());
        if next_pos >= candidates.len() {
            break;
        }
        pos = next_pos;
    }

    Ok(candidates)
}

/// Committer date descending; equal timestamps fall back to hash order so
/// ties resolve the same way on every run.
fn sort_by_commit_date_desc(mut commits: Vec<CommitNode>) -> Vec<CommitNode> {
    commits.sort_by(|a, b| {
        b.commit()
            .committed_when()
            .cmp(&a.commit().committed_when())
            .then_with(|| b.hash().cmp(a.hash()))
    });
    commits
}

fn remove_duplicates(commits: Vec<CommitNode>) -> Vec<CommitNode> {
    let mut seen = HashSet::with_capacity(commits.len());
    commits
        .into_iter()
        .filter(|commit| seen.insert(commit.hash().clone()))
        .collect()
}
