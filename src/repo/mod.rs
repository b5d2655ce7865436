//! WorkRepository: the current checkout and everything that mutates it
//!
//! A [`WorkRepository`] binds an operator to one repository plus the stores
//! it lives in, and tracks what is checked out: a branch, a commit, a tag,
//! or the operator's work-in-process area on a branch. Reads go through the
//! checkout's tree; writes require a WIP and funnel through staged tree
//! rewrites; `commit_changes` and `merge` are the only operations that
//! advance a branch, both guarded by the branch's pre-image hash so racing
//! committers lose with `StaleBase` instead of clobbering each other.

use crate::error::{Error, ErrorKind, Result};
use crate::hash::Hash;
use crate::history::{CommitNode, DateOrderIter, merge_base};
use crate::objects::{Blob, Commit, Object, Property, Signature, Tag, TreeEntry};
use crate::store::{
    AdapterConfig, BlockAdapter, Branch, MergeRequest, MergeStatus, MetadataStore, ObjectStore,
    RepositoryRecord, Wip,
};
use crate::worktree::{Changes, WorkTree};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info};
use uuid::Uuid;

/// Name given to the first branch of a new repository.
pub const DEFAULT_BRANCH: &str = "main";

/// The identity performing operations, supplied by the caller's auth layer.
#[derive(Debug, Clone, derive_new::new)]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl Operator {
    fn signature(&self) -> Signature {
        Signature::new(self.name.clone(), self.email.clone(), Utc::now())
    }
}

/// What kind of reference is currently checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkRepoState {
    InBranch,
    InWip,
    InCommit,
    InTag,
}

pub struct WorkRepository {
    operator: Operator,
    repository: RepositoryRecord,
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    blocks: Arc<dyn BlockAdapter>,
    state: Option<WorkRepoState>,
    cur_branch: Option<Branch>,
    cur_commit: Option<Commit>,
    cur_wip: Option<Wip>,
}

/// Create a repository record together with its default branch, atomically.
pub async fn init_repository(
    metadata: &Arc<dyn MetadataStore>,
    operator: &Operator,
    name: &str,
) -> Result<(RepositoryRecord, Branch)> {
    let record = RepositoryRecord::new(operator.id, name, DEFAULT_BRANCH, operator.id)?;
    let branch = Branch::new(record.id, DEFAULT_BRANCH, Hash::empty(), operator.id)?;

    let (record_tx, branch_tx) = (record.clone(), branch.clone());
    metadata
        .transaction(Box::new(move |tx| {
            Box::pin(async move {
                tx.repositories().insert(record_tx).await?;
                tx.branches().insert(branch_tx).await?;
                Ok(())
            })
        }))
        .await?;

    info!(repository = %record.name, "initialized repository");
    Ok((record, branch))
}

impl WorkRepository {
    pub fn new(
        operator: Operator,
        repository: RepositoryRecord,
        metadata: Arc<dyn MetadataStore>,
        blocks: Arc<dyn BlockAdapter>,
    ) -> Self {
        let objects = metadata.objects(repository.id);
        WorkRepository {
            operator,
            repository,
            metadata,
            objects,
            blocks,
            state: None,
            cur_branch: None,
            cur_commit: None,
            cur_wip: None,
        }
    }

    /// Construct with the blob adapter described by service configuration.
    pub fn from_config(
        operator: Operator,
        repository: RepositoryRecord,
        metadata: Arc<dyn MetadataStore>,
        config: &AdapterConfig,
    ) -> Self {
        let blocks = config.build();
        Self::new(operator, repository, metadata, blocks)
    }

    pub fn repository(&self) -> &RepositoryRecord {
        &self.repository
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn state(&self) -> Option<WorkRepoState> {
        self.state
    }

    pub fn cur_branch(&self) -> Option<&Branch> {
        self.cur_branch.as_ref()
    }

    pub fn cur_commit(&self) -> Option<&Commit> {
        self.cur_commit.as_ref()
    }

    pub fn cur_wip(&self) -> Option<&Wip> {
        self.cur_wip.as_ref()
    }

    /// Object-store handle scoped to this repository.
    pub fn objects(&self) -> Arc<dyn ObjectStore> {
        self.objects.clone()
    }

    /// Resolve a reference and make it the current checkout.
    pub async fn checkout(&mut self, kind: WorkRepoState, reference: &str) -> Result<()> {
        match kind {
            WorkRepoState::InBranch => {
                let branch = self
                    .metadata
                    .branches()
                    .get(self.repository.id, reference)
                    .await?;
                self.cur_commit = if branch.commit_hash.is_empty() {
                    None
                } else {
                    Some(self.objects.commit(&branch.commit_hash).await?)
                };
                self.cur_branch = Some(branch);
                self.cur_wip = None;
            }
            WorkRepoState::InWip => {
                let branch = self
                    .metadata
                    .branches()
                    .get(self.repository.id, reference)
                    .await?;
                let wip = self
                    .metadata
                    .wips()
                    .get(self.repository.id, branch.id, self.operator.id)
                    .await?;
                self.cur_commit = if wip.base_commit.is_empty() {
                    None
                } else {
                    Some(self.objects.commit(&wip.base_commit).await?)
                };
                self.cur_branch = Some(branch);
                self.cur_wip = Some(wip);
            }
            WorkRepoState::InCommit => {
                let hash = Hash::from_hex(reference)?;
                if hash.is_empty() {
                    return Err(Error::Invalid("empty commit hash".to_string()));
                }
                self.cur_commit = Some(self.objects.commit(&hash).await?);
                self.cur_branch = None;
                self.cur_wip = None;
            }
            WorkRepoState::InTag => {
                let tag = self.objects.tag_by_name(reference).await?;
                self.cur_commit = Some(self.objects.commit(&tag.target).await?);
                self.cur_branch = None;
                self.cur_wip = None;
            }
        }
        self.state = Some(kind);
        Ok(())
    }

    /// Root tree of the current checkout.
    fn current_root(&self) -> Result<Hash> {
        match self.state {
            Some(WorkRepoState::InWip) => {
                let wip = self
                    .cur_wip
                    .as_ref()
                    .ok_or_else(|| Error::Invalid("wip checkout lost its wip".to_string()))?;
                Ok(wip.current_tree.clone())
            }
            Some(_) => Ok(self
                .cur_commit
                .as_ref()
                .map(|commit| commit.tree_hash.clone())
                .unwrap_or_else(Hash::empty)),
            None => Err(Error::Invalid("nothing checked out".to_string())),
        }
    }

    /// Open a [`WorkTree`] over the current checkout's root.
    pub async fn work_tree(&self) -> Result<WorkTree> {
        WorkTree::new(self.objects.clone(), TreeEntry::root(self.current_root()?)).await
    }

    fn require_branch(&self) -> Result<&Branch> {
        self.cur_branch
            .as_ref()
            .ok_or_else(|| Error::Invalid("operation requires a branch checkout".to_string()))
    }

    fn require_wip(&self) -> Result<&Wip> {
        match (self.state, &self.cur_wip) {
            (Some(WorkRepoState::InWip), Some(wip)) => Ok(wip),
            _ => Err(Error::Invalid(
                "operation requires a work-in-process checkout".to_string(),
            )),
        }
    }

    /// Fetch the operator's WIP on the current branch, creating it if
    /// absent. Idempotent; enters the WIP checkout. The bool reports
    /// whether a new WIP was created.
    pub async fn get_or_create_wip(&mut self) -> Result<(Wip, bool)> {
        let branch = self.require_branch()?.clone();

        let (wip, created) = match self
            .metadata
            .wips()
            .get(self.repository.id, branch.id, self.operator.id)
            .await
        {
            Ok(wip) => (wip, false),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let base_commit = branch.commit_hash.clone();
                let current_tree = if base_commit.is_empty() {
                    Hash::empty()
                } else {
                    self.objects.commit(&base_commit).await?.tree_hash
                };
                let wip = self
                    .metadata
                    .wips()
                    .insert(Wip::new(
                        self.repository.id,
                        branch.id,
                        self.operator.id,
                        base_commit,
                        current_tree,
                    ))
                    .await?;
                debug!(branch = %branch.name, "created wip");
                (wip, true)
            }
            Err(err) => return Err(err),
        };

        self.cur_commit = if wip.base_commit.is_empty() {
            None
        } else {
            Some(self.objects.commit(&wip.base_commit).await?)
        };
        self.cur_wip = Some(wip.clone());
        self.state = Some(WorkRepoState::InWip);
        Ok((wip, created))
    }

    /// Swap the WIP's staged tree, guarded by its pre-image.
    async fn update_wip_tree(&mut self, wip: &Wip, new_root: &Hash) -> Result<()> {
        self.metadata
            .wips()
            .update_current_tree(wip.id, &wip.current_tree, new_root)
            .await?;
        if let Some(current) = &mut self.cur_wip {
            current.current_tree = new_root.clone();
        }
        Ok(())
    }

    /// Stream a payload into the blob adapter and stage it at `path`. An
    /// occupied path fails `Conflict` unless `replace` is set.
    pub async fn add_file(
        &mut self,
        path: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        replace: bool,
    ) -> Result<Blob> {
        let wip = self.require_wip()?.clone();

        let upload = self
            .blocks
            .put(&self.repository.storage_namespace, reader)
            .await?;
        let blob = Blob::new(
            self.repository.id,
            Property::regular(),
            upload.check_sum,
            upload.size,
        );
        let blob = self
            .objects
            .insert(Object::Blob(blob))
            .await?
            .into_blob()?;

        let mut tree = WorkTree::new(
            self.objects.clone(),
            TreeEntry::root(wip.current_tree.clone()),
        )
        .await?;
        match tree.add_leaf(path, &blob).await {
            Ok(()) => {}
            Err(Error::EntryExists(existing)) => {
                if !replace {
                    return Err(Error::Conflict(format!("path exists: {existing}")));
                }
                tree.replace_leaf(path, &blob).await?;
            }
            Err(err) => return Err(err),
        }

        self.update_wip_tree(&wip, &tree.root_hash().clone()).await?;
        debug!(path, size = blob.size, "staged file");
        Ok(blob)
    }

    /// Unstage the entry at `path` (file or directory).
    pub async fn delete_file(&mut self, path: &str) -> Result<()> {
        let wip = self.require_wip()?.clone();
        let mut tree = WorkTree::new(
            self.objects.clone(),
            TreeEntry::root(wip.current_tree.clone()),
        )
        .await?;
        tree.remove_entry(path).await?;
        self.update_wip_tree(&wip, &tree.root_hash().clone()).await?;
        debug!(path, "unstaged file");
        Ok(())
    }

    /// Read a file and its payload back from the current checkout.
    pub async fn get_object(&self, path: &str) -> Result<(Blob, Bytes)> {
        let tree = self.work_tree().await?;
        let (blob, _) = tree.find_blob(path).await?;
        let payload = self
            .blocks
            .get(&self.repository.storage_namespace, &blob.check_sum, None)
            .await?;
        Ok((blob, payload))
    }

    /// Undo staged changes under `prefix` (everything when empty), walking
    /// the diff between the WIP base and its current tree backwards.
    pub async fn revert(&mut self, prefix: &str) -> Result<()> {
        let wip = self.require_wip()?.clone();
        let base_tree = if wip.base_commit.is_empty() {
            Hash::empty()
        } else {
            self.objects.commit(&wip.base_commit).await?.tree_hash
        };

        let base_view =
            WorkTree::new(self.objects.clone(), TreeEntry::root(base_tree)).await?;
        let changes = base_view.diff(&wip.current_tree, prefix).await?;

        let mut tree = WorkTree::new(
            self.objects.clone(),
            TreeEntry::root(wip.current_tree.clone()),
        )
        .await?;
        // undo newest-path-first so kind flips unwind cleanly
        for change in changes.into_inner().iter().rev() {
            tree.apply_inverse(change).await?;
        }

        self.update_wip_tree(&wip, &tree.root_hash().clone()).await?;
        debug!(prefix, "reverted staged changes");
        Ok(())
    }

    /// Turn the staged tree into a commit and advance the branch. Fails
    /// `Invalid` with nothing staged, `StaleBase` when another committer
    /// advanced the branch first.
    pub async fn commit_changes(&mut self, message: &str) -> Result<Commit> {
        let wip = self.require_wip()?.clone();
        let branch = self.require_branch()?.clone();

        let base_tree = if wip.base_commit.is_empty() {
            Hash::empty()
        } else {
            self.objects.commit(&wip.base_commit).await?.tree_hash
        };
        if wip.current_tree == base_tree {
            return Err(Error::Invalid("no changes to commit".to_string()));
        }

        let signature = self.operator.signature();
        let parents = if wip.base_commit.is_empty() {
            Vec::new()
        } else {
            vec![wip.base_commit.clone()]
        };
        let commit = Commit::new(
            self.repository.id,
            signature.clone(),
            signature,
            wip.current_tree.clone(),
            parents,
            message,
        );

        let repository_id = self.repository.id;
        let (branch_id, wip_id) = (branch.id, wip.id);
        let wip_base = wip.base_commit.clone();
        let commit_tx = commit.clone();
        self.metadata
            .transaction(Box::new(move |tx| {
                Box::pin(async move {
                    let fresh = tx.branches().get_by_id(branch_id).await?;
                    if fresh.commit_hash != wip_base {
                        // another committer advanced the branch under us
                        return Err(Error::StaleBase {
                            expected: wip_base.to_hex(),
                            actual: fresh.commit_hash.to_hex(),
                        });
                    }
                    tx.objects(repository_id)
                        .insert(Object::Commit(commit_tx.clone()))
                        .await?;
                    tx.branches()
                        .update_commit_hash(branch_id, &wip_base, &commit_tx.hash)
                        .await?;
                    tx.wips()
                        .reset_on_commit(wip_id, &commit_tx.hash, &commit_tx.tree_hash)
                        .await?;
                    Ok(())
                })
            }))
            .await?;

        info!(branch = %branch.name, commit = %commit.hash, "committed wip");
        self.cur_commit = Some(commit.clone());
        if let Some(current) = &mut self.cur_branch {
            current.commit_hash = commit.hash.clone();
        }
        if let Some(current) = &mut self.cur_wip {
            current.base_commit = commit.hash.clone();
            current.current_tree = commit.tree_hash.clone();
        }
        Ok(commit)
    }

    /// Drop the operator's WIP on the current branch. Underlying blobs stay
    /// in place; they are orphaned, not reclaimed.
    pub async fn delete_wip(&mut self) -> Result<()> {
        let branch = self.require_branch()?.clone();
        let deleted = self
            .metadata
            .wips()
            .delete(self.repository.id, branch.id, self.operator.id)
            .await?;
        if deleted == 0 {
            return Err(Error::not_found("wip", &branch.name));
        }
        self.cur_wip = None;
        if self.state == Some(WorkRepoState::InWip) {
            self.state = Some(WorkRepoState::InBranch);
        }
        Ok(())
    }

    /// Merge the given commit into the currently checked-out branch.
    ///
    /// Outcomes: an up-to-date no-op returning the target commit; a
    /// fast-forward advancing the branch to `source` without a new commit;
    /// or a clean three-way merge producing a commit with parents
    /// `[target, source]`. Conflicting paths fail with `MergeConflict`.
    pub async fn merge(&mut self, source: &Hash, message: &str) -> Result<Commit> {
        let branch = self.require_branch()?.clone();
        let source_commit = self.objects.commit(source).await?;

        // a branch with no commits simply adopts the source
        if branch.commit_hash.is_empty() {
            self.metadata
                .branches()
                .update_commit_hash(branch.id, &Hash::empty(), &source_commit.hash)
                .await?;
            self.refresh_after_advance(&source_commit);
            info!(branch = %branch.name, commit = %source_commit.hash, "fast-forward merge");
            return Ok(source_commit);
        }

        let target_commit = self.objects.commit(&branch.commit_hash).await?;
        let source_node = CommitNode::new(self.objects.clone(), source_commit.clone());
        let target_node = CommitNode::new(self.objects.clone(), target_commit.clone());

        let bases = merge_base(&source_node, &target_node).await?;
        if bases.is_empty() {
            return Err(Error::Conflict(
                "no common ancestor between source and target".to_string(),
            ));
        }

        if bases.iter().any(|base| base.hash() == &source_commit.hash) {
            // target already contains the source
            debug!(branch = %branch.name, "merge is a no-op, already up to date");
            return Ok(target_commit);
        }

        if bases.iter().any(|base| base.hash() == &target_commit.hash) {
            // target is an ancestor of source: advance the pointer
            self.metadata
                .branches()
                .update_commit_hash(branch.id, &target_commit.hash, &source_commit.hash)
                .await?;
            self.refresh_after_advance(&source_commit);
            info!(branch = %branch.name, commit = %source_commit.hash, "fast-forward merge");
            return Ok(source_commit);
        }

        // any independent base works; take the first
        let base = bases[0].clone();
        let base_view = WorkTree::new(
            self.objects.clone(),
            TreeEntry::root(base.commit().tree_hash.clone()),
        )
        .await?;
        let source_changes = base_view.diff(&source_commit.tree_hash, "").await?;
        let target_changes = base_view.diff(&target_commit.tree_hash, "").await?;

        let conflicts: Vec<String> = source_changes
            .iter()
            .filter_map(|change| {
                let other = target_changes.get(&change.path)?;
                let compatible =
                    change.action == other.action && change.to_hash() == other.to_hash();
                (!compatible).then(|| change.path.clone())
            })
            .collect();
        if !conflicts.is_empty() {
            return Err(Error::MergeConflict { paths: conflicts });
        }

        // replay what the source did on top of the target, skipping changes
        // the target already carries
        let mut tree = WorkTree::new(
            self.objects.clone(),
            TreeEntry::root(target_commit.tree_hash.clone()),
        )
        .await?;
        for change in source_changes.iter() {
            if target_changes.get(&change.path).is_none() {
                tree.apply_one_change(change).await?;
            }
        }

        let signature = self.operator.signature();
        let merge_commit = Commit::new(
            self.repository.id,
            signature.clone(),
            signature,
            tree.root_hash().clone(),
            vec![target_commit.hash.clone(), source_commit.hash.clone()],
            message,
        );

        let repository_id = self.repository.id;
        let branch_id = branch.id;
        let pre_image = target_commit.hash.clone();
        let commit_tx = merge_commit.clone();
        self.metadata
            .transaction(Box::new(move |tx| {
                Box::pin(async move {
                    tx.objects(repository_id)
                        .insert(Object::Commit(commit_tx.clone()))
                        .await?;
                    tx.branches()
                        .update_commit_hash(branch_id, &pre_image, &commit_tx.hash)
                        .await?;
                    Ok(())
                })
            }))
            .await?;

        info!(branch = %branch.name, commit = %merge_commit.hash, "merged");
        self.refresh_after_advance(&merge_commit);
        Ok(merge_commit)
    }

    fn refresh_after_advance(&mut self, commit: &Commit) {
        self.cur_commit = Some(commit.clone());
        if let Some(current) = &mut self.cur_branch {
            current.commit_hash = commit.hash.clone();
        }
    }

    /// Merge another branch of this repository into the current branch.
    pub async fn merge_branch(&mut self, source_branch: &str, message: &str) -> Result<Commit> {
        let source = self
            .metadata
            .branches()
            .get(self.repository.id, source_branch)
            .await?;
        if source.commit_hash.is_empty() {
            return Err(Error::Invalid(format!(
                "source branch {source_branch:?} has no commits"
            )));
        }
        self.merge(&source.commit_hash, message).await
    }

    /// Create a branch pointing at the current commit (or at nothing when
    /// the checkout is an unborn branch).
    pub async fn create_branch(&self, name: &str) -> Result<Branch> {
        let commit_hash = self
            .cur_commit
            .as_ref()
            .map(|commit| commit.hash.clone())
            .unwrap_or_else(Hash::empty);
        let branch = Branch::new(self.repository.id, name, commit_hash, self.operator.id)?;
        self.metadata.branches().insert(branch).await
    }

    /// Tag the current commit.
    pub async fn create_tag(&self, name: &str, message: Option<String>) -> Result<Tag> {
        let commit = self
            .cur_commit
            .as_ref()
            .ok_or_else(|| Error::Invalid("no commit checked out".to_string()))?;
        let tag = Tag::new(
            self.repository.id,
            name,
            commit.hash.clone(),
            self.operator.signature(),
            message,
        );
        self.objects.insert(Object::Tag(tag)).await?.into_tag()
    }

    /// Open a merge request proposing `source_branch` into `target_branch`.
    pub async fn open_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
    ) -> Result<MergeRequest> {
        let source = self
            .metadata
            .branches()
            .get(self.repository.id, source_branch)
            .await?;
        let target = self
            .metadata
            .branches()
            .get(self.repository.id, target_branch)
            .await?;
        self.metadata
            .merge_requests()
            .insert(MergeRequest::new(
                self.repository.id,
                source.id,
                target.id,
                title,
                self.operator.id,
            ))
            .await
    }

    /// Merge an open merge request and mark it merged.
    pub async fn merge_merge_request(&mut self, id: Uuid, message: &str) -> Result<Commit> {
        let merge_request = self.metadata.merge_requests().get(id).await?;
        if merge_request.status != MergeStatus::Open {
            return Err(Error::Conflict("merge request is not open".to_string()));
        }

        let source = self
            .metadata
            .branches()
            .get_by_id(merge_request.source_branch_id)
            .await?;
        let target = self
            .metadata
            .branches()
            .get_by_id(merge_request.target_branch_id)
            .await?;
        if source.commit_hash.is_empty() {
            return Err(Error::Invalid("source branch has no commits".to_string()));
        }

        self.checkout(WorkRepoState::InBranch, &target.name).await?;
        let commit = self.merge(&source.commit_hash, message).await?;
        self.metadata
            .merge_requests()
            .update_status(id, MergeStatus::Merged)
            .await?;
        Ok(commit)
    }

    /// Diff two commits given as hex hashes, filtered by path prefix.
    pub async fn diff_commits(
        &self,
        from_hex: &str,
        to_hex: &str,
        prefix: &str,
    ) -> Result<Changes> {
        let from = self.objects.commit(&Hash::from_hex(from_hex)?).await?;
        let to = self.objects.commit(&Hash::from_hex(to_hex)?).await?;
        let view = WorkTree::new(self.objects.clone(), TreeEntry::root(from.tree_hash)).await?;
        view.diff(&to.tree_hash, prefix).await
    }

    /// History of the current checkout, newest first by committer date.
    pub async fn history(&self) -> Result<Vec<Commit>> {
        let Some(commit) = &self.cur_commit else {
            return Ok(Vec::new());
        };
        let mut commits = Vec::new();
        let mut iter = DateOrderIter::new(CommitNode::new(self.objects.clone(), commit.clone()));
        while let Some(node) = iter.next().await? {
            commits.push(node.commit().clone());
        }
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBlock, MemoryMetadata};

    struct Harness {
        metadata: Arc<dyn MetadataStore>,
        repo: WorkRepository,
    }

    async fn harness() -> Harness {
        let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadata::new());
        let operator = Operator::new(Uuid::new_v4(), "ann".to_string(), "ann@example.com".to_string());
        let (record, _) = init_repository(&metadata, &operator, "dataset").await.unwrap();
        let repo = WorkRepository::new(
            operator,
            record,
            metadata.clone(),
            Arc::new(MemoryBlock::new()),
        );
        Harness { metadata, repo }
    }

    async fn stage_and_commit(repo: &mut WorkRepository, path: &str, payload: &[u8], message: &str) -> Commit {
        repo.get_or_create_wip().await.unwrap();
        let mut reader = payload;
        repo.add_file(path, &mut reader, true).await.unwrap();
        repo.commit_changes(message).await.unwrap()
    }

    #[tokio::test]
    async fn checkout_unknown_branch_fails() {
        let mut h = harness().await;
        let err = h
            .repo
            .checkout(WorkRepoState::InBranch, "missing")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn checkout_commit_rejects_bad_hex() {
        let mut h = harness().await;
        let err = h
            .repo
            .checkout(WorkRepoState::InCommit, "not-hex")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        let err = h
            .repo
            .checkout(WorkRepoState::InCommit, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn writes_require_a_wip_checkout() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let mut reader = &b"payload"[..];
        let err = h.repo.add_file("f.bin", &mut reader, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn get_or_create_wip_is_idempotent() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let (first, created) = h.repo.get_or_create_wip().await.unwrap();
        assert!(created);
        let (second, created) = h.repo.get_or_create_wip().await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(h.repo.state(), Some(WorkRepoState::InWip));
    }

    #[tokio::test]
    async fn empty_commit_is_refused() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        h.repo.get_or_create_wip().await.unwrap();
        let err = h.repo.commit_changes("nothing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn merge_source_ancestor_of_target_is_a_no_op() {
        // main: c1 <- c2; merging c1 back into main must change nothing
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let c1 = stage_and_commit(&mut h.repo, "a.bin", b"one", "c1").await;
        let c2 = stage_and_commit(&mut h.repo, "b.bin", b"two", "c2").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let result = h.repo.merge(&c1.hash, "merge old tip").await.unwrap();
        assert_eq!(result.hash, c2.hash);

        let branch = h
            .metadata
            .branches()
            .get(h.repo.repository().id, DEFAULT_BRANCH)
            .await
            .unwrap();
        assert_eq!(branch.commit_hash, c2.hash);
    }

    #[tokio::test]
    async fn merging_the_tip_into_itself_is_a_no_op() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let tip = stage_and_commit(&mut h.repo, "a.bin", b"one", "c1").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let result = h.repo.merge(&tip.hash, "self merge").await.unwrap();
        assert_eq!(result.hash, tip.hash);

        let branch = h
            .metadata
            .branches()
            .get(h.repo.repository().id, DEFAULT_BRANCH)
            .await
            .unwrap();
        assert_eq!(branch.commit_hash, tip.hash);
    }

    #[tokio::test]
    async fn merge_target_ancestor_of_source_fast_forwards() {
        // feat moves ahead of main; merging feat into main advances the
        // pointer without a merge commit
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        stage_and_commit(&mut h.repo, "a.bin", b"one", "c1").await;

        h.repo.create_branch("feat").await.unwrap();
        h.repo.checkout(WorkRepoState::InBranch, "feat").await.unwrap();
        let tip = stage_and_commit(&mut h.repo, "b.bin", b"two", "c2").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let result = h.repo.merge_branch("feat", "merge feat").await.unwrap();
        assert_eq!(result.hash, tip.hash);
        assert_eq!(result.parent_hashes, tip.parent_hashes);

        let branch = h
            .metadata
            .branches()
            .get(h.repo.repository().id, DEFAULT_BRANCH)
            .await
            .unwrap();
        assert_eq!(branch.commit_hash, tip.hash);
    }

    #[tokio::test]
    async fn conflicting_merge_reports_paths() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        stage_and_commit(&mut h.repo, "shared.bin", b"base", "base").await;

        h.repo.create_branch("feat").await.unwrap();
        h.repo.checkout(WorkRepoState::InBranch, "feat").await.unwrap();
        stage_and_commit(&mut h.repo, "shared.bin", b"feat-edit", "feat edit").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        stage_and_commit(&mut h.repo, "shared.bin", b"main-edit", "main edit").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let err = h.repo.merge_branch("feat", "collide").await.unwrap_err();
        match err {
            Error::MergeConflict { paths } => assert_eq!(paths, vec!["shared.bin"]),
            other => panic!("expected merge conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identical_changes_on_both_sides_do_not_conflict() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        stage_and_commit(&mut h.repo, "shared.bin", b"base", "base").await;

        h.repo.create_branch("feat").await.unwrap();
        h.repo.checkout(WorkRepoState::InBranch, "feat").await.unwrap();
        stage_and_commit(&mut h.repo, "shared.bin", b"same-edit", "feat edit").await;
        stage_and_commit(&mut h.repo, "feat-only.bin", b"extra", "feat extra").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        stage_and_commit(&mut h.repo, "shared.bin", b"same-edit", "main edit").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let merged = h.repo.merge_branch("feat", "converge").await.unwrap();
        assert_eq!(merged.parent_hashes.len(), 2);

        let tree = h.repo.work_tree().await.unwrap();
        assert!(tree.find_blob("feat-only.bin").await.is_ok());
    }

    #[tokio::test]
    async fn merge_request_lifecycle() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        stage_and_commit(&mut h.repo, "a.bin", b"base", "base").await;

        h.repo.create_branch("feat").await.unwrap();
        h.repo.checkout(WorkRepoState::InBranch, "feat").await.unwrap();
        stage_and_commit(&mut h.repo, "b.bin", b"feature", "feature").await;

        let mr = h
            .repo
            .open_merge_request("feat", DEFAULT_BRANCH, "add b")
            .await
            .unwrap();
        assert_eq!(mr.status, MergeStatus::Open);
        assert_eq!(mr.sequence, 1);

        h.repo.merge_merge_request(mr.id, "merge add b").await.unwrap();
        let merged = h.metadata.merge_requests().get(mr.id).await.unwrap();
        assert_eq!(merged.status, MergeStatus::Merged);

        // a merged request cannot merge twice
        let err = h
            .repo
            .merge_merge_request(mr.id, "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn tag_checkout_resolves_target_commit() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let commit = stage_and_commit(&mut h.repo, "a.bin", b"v1", "v1").await;
        h.repo
            .create_tag("v1.0", Some("first release".to_string()))
            .await
            .unwrap();

        let mut fresh = WorkRepository::new(
            h.repo.operator().clone(),
            h.repo.repository().clone(),
            h.metadata.clone(),
            Arc::new(MemoryBlock::new()),
        );
        fresh.checkout(WorkRepoState::InTag, "v1.0").await.unwrap();
        assert_eq!(fresh.cur_commit().map(|c| c.hash.clone()), Some(commit.hash));
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let mut h = harness().await;
        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let c1 = stage_and_commit(&mut h.repo, "a.bin", b"1", "c1").await;
        let c2 = stage_and_commit(&mut h.repo, "b.bin", b"2", "c2").await;

        h.repo
            .checkout(WorkRepoState::InBranch, DEFAULT_BRANCH)
            .await
            .unwrap();
        let history = h.repo.history().await.unwrap();
        let hashes: Vec<_> = history.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(hashes, vec![c2.hash, c1.hash]);
        assert_eq!(history[1].parent_hashes.len(), 0);
    }
}
