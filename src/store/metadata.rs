//! Metadata entities and store contracts
//!
//! The engine never talks to a database directly; it consumes these traits.
//! Blobs, trees, commits and tags go through [`ObjectStore`] (append-only,
//! idempotent insert). Branches, WIPs, repositories and merge requests are
//! the only mutable rows, and every mutation that races goes through a
//! conditional update carrying the pre-image as a guard: a mismatch fails
//! with `StaleBase` and the caller decides whether to retry.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::objects::{Blob, Commit, Object, Tag, TreeNode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Named mutable pointer to a commit within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub repository_id: Uuid,
    /// Empty until the first commit lands.
    pub commit_hash: Hash,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(
        repository_id: Uuid,
        name: impl Into<String>,
        commit_hash: Hash,
        creator_id: Uuid,
    ) -> Result<Self> {
        let name = name.into();
        validate_ref_name(&name)?;
        let now = Utc::now();
        Ok(Branch {
            id: Uuid::new_v4(),
            repository_id,
            commit_hash,
            name,
            description: None,
            creator_id,
            created_at: now,
            updated_at: now,
        })
    }
}

fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('-')
        || name.starts_with('/')
        || name.ends_with('/')
        || name.contains("..")
        || name.chars().any(|c| c.is_whitespace() || c == '~' || c == '^' || c == ':')
    {
        return Err(Error::Invalid(format!("ref name: {name:?}")));
    }
    Ok(())
}

/// Lifecycle state of a work-in-process area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WipState {
    Init,
    Completed,
}

/// Per-(branch, user) staging area: a mutable tree derived from a base
/// commit. At most one exists per (repository, ref, creator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wip {
    pub id: Uuid,
    pub repository_id: Uuid,
    /// Branch this WIP stages onto.
    pub ref_id: Uuid,
    pub creator_id: Uuid,
    pub base_commit: Hash,
    pub current_tree: Hash,
    pub state: WipState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wip {
    pub fn new(
        repository_id: Uuid,
        ref_id: Uuid,
        creator_id: Uuid,
        base_commit: Hash,
        current_tree: Hash,
    ) -> Self {
        let now = Utc::now();
        Wip {
            id: Uuid::new_v4(),
            repository_id,
            ref_id,
            creator_id,
            base_commit,
            current_tree,
            state: WipState::Init,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository row: ownership, HEAD branch name and the namespace payloads
/// are stored under in the blob adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub head: String,
    pub description: Option<String>,
    pub storage_namespace: String,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryRecord {
    pub fn new(
        owner_id: Uuid,
        name: impl Into<String>,
        head: impl Into<String>,
        creator_id: Uuid,
    ) -> Result<Self> {
        let name = name.into();
        validate_ref_name(&name)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        Ok(RepositoryRecord {
            id,
            owner_id,
            name,
            head: head.into(),
            description: None,
            storage_namespace: id.simple().to_string(),
            creator_id,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStatus {
    Open,
    Merged,
    Closed,
}

/// Review container proposing one branch be merged into another. Only
/// `status` and `assignee_id` mutate after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: Uuid,
    pub sequence: u64,
    pub repository_id: Uuid,
    pub source_branch_id: Uuid,
    pub target_branch_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub author_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub status: MergeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MergeRequest {
    pub fn new(
        repository_id: Uuid,
        source_branch_id: Uuid,
        target_branch_id: Uuid,
        title: impl Into<String>,
        author_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        MergeRequest {
            id: Uuid::new_v4(),
            sequence: 0,
            repository_id,
            source_branch_id,
            target_branch_id,
            title: title.into(),
            description: None,
            author_id,
            assignee_id: None,
            status: MergeStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only store of content-addressed objects, scoped to one
/// repository. Insert is idempotent on (repository, hash): re-inserting an
/// identical object succeeds as a no-op.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn repository_id(&self) -> Uuid;

    async fn insert(&self, object: Object) -> Result<Object>;

    async fn get(&self, hash: &Hash) -> Result<Object>;

    async fn blob(&self, hash: &Hash) -> Result<Blob>;

    async fn tree_node(&self, hash: &Hash) -> Result<TreeNode>;

    async fn commit(&self, hash: &Hash) -> Result<Commit>;

    async fn tag(&self, hash: &Hash) -> Result<Tag>;

    async fn tag_by_name(&self, name: &str) -> Result<Tag>;

    async fn count(&self) -> Result<usize>;

    async fn list(&self) -> Result<Vec<Object>>;
}

#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Fails `AlreadyExists` on a duplicate (repository, name).
    async fn insert(&self, branch: Branch) -> Result<Branch>;

    async fn get(&self, repository_id: Uuid, name: &str) -> Result<Branch>;

    async fn get_by_id(&self, id: Uuid) -> Result<Branch>;

    async fn list(&self, repository_id: Uuid) -> Result<Vec<Branch>>;

    /// Conditional advance: fails `StaleBase` unless the stored hash still
    /// equals `expected`.
    async fn update_commit_hash(&self, id: Uuid, expected: &Hash, new: &Hash) -> Result<()>;

    async fn delete(&self, repository_id: Uuid, name: &str) -> Result<u64>;
}

#[async_trait]
pub trait WipStore: Send + Sync {
    /// Fails `AlreadyExists` if the (repository, ref, creator) slot is taken.
    async fn insert(&self, wip: Wip) -> Result<Wip>;

    async fn get(&self, repository_id: Uuid, ref_id: Uuid, creator_id: Uuid) -> Result<Wip>;

    async fn list(&self, repository_id: Uuid, creator_id: Option<Uuid>) -> Result<Vec<Wip>>;

    /// Conditional staging update: fails `StaleBase` unless the stored tree
    /// still equals `expected`.
    async fn update_current_tree(&self, id: Uuid, expected: &Hash, new: &Hash) -> Result<()>;

    /// Post-commit reset: point the WIP at the new base with a clean tree.
    async fn reset_on_commit(&self, id: Uuid, base_commit: &Hash, current_tree: &Hash)
    -> Result<()>;

    async fn delete(&self, repository_id: Uuid, ref_id: Uuid, creator_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Fails `AlreadyExists` on a duplicate (owner, name).
    async fn insert(&self, repository: RepositoryRecord) -> Result<RepositoryRecord>;

    async fn get(&self, owner_id: Uuid, name: &str) -> Result<RepositoryRecord>;

    async fn get_by_id(&self, id: Uuid) -> Result<RepositoryRecord>;

    async fn list(&self, owner_id: Uuid) -> Result<Vec<RepositoryRecord>>;

    async fn update_head(&self, id: Uuid, head: &str) -> Result<()>;

    async fn delete(&self, owner_id: Uuid, name: &str) -> Result<u64>;
}

#[async_trait]
pub trait MergeRequestStore: Send + Sync {
    async fn insert(&self, merge_request: MergeRequest) -> Result<MergeRequest>;

    async fn get(&self, id: Uuid) -> Result<MergeRequest>;

    async fn list(&self, repository_id: Uuid) -> Result<Vec<MergeRequest>>;

    async fn update_status(&self, id: Uuid, status: MergeStatus) -> Result<()>;

    async fn set_assignee(&self, id: Uuid, assignee_id: Option<Uuid>) -> Result<()>;
}

/// Transaction body: receives a store handle whose mutations are scoped to
/// the transaction.
pub type TxFn = Box<dyn FnOnce(Arc<dyn MetadataStore>) -> BoxFuture<'static, Result<()>> + Send>;

/// Aggregate over every metadata store plus transaction scoping. Injected
/// per operation so the engine stays testable against in-memory fakes.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    fn objects(&self, repository_id: Uuid) -> Arc<dyn ObjectStore>;

    fn branches(&self) -> Arc<dyn BranchStore>;

    fn wips(&self) -> Arc<dyn WipStore>;

    fn repositories(&self) -> Arc<dyn RepositoryStore>;

    fn merge_requests(&self) -> Arc<dyn MergeRequestStore>;

    /// Run `op` atomically. Partial effects are never visible to other
    /// callers. Nested transactions flatten into the outermost one.
    async fn transaction(&self, op: TxFn) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_names_are_validated() {
        let repo = Uuid::new_v4();
        let creator = Uuid::new_v4();
        assert!(Branch::new(repo, "main", Hash::empty(), creator).is_ok());
        assert!(Branch::new(repo, "feat/nested", Hash::empty(), creator).is_ok());
        for bad in ["", "-lead", "has space", "a..b", "tail/", "/lead", "ti~lde"] {
            assert!(
                Branch::new(repo, bad, Hash::empty(), creator).is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn new_wip_starts_clean() {
        let wip = Wip::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Hash::empty(),
            Hash::empty(),
        );
        assert_eq!(wip.state, WipState::Init);
        assert_eq!(wip.base_commit, wip.current_tree);
    }

    #[test]
    fn repository_gets_a_storage_namespace() {
        let record =
            RepositoryRecord::new(Uuid::new_v4(), "dataset", "main", Uuid::new_v4()).unwrap();
        assert!(!record.storage_namespace.is_empty());
        assert_eq!(record.head, "main");
    }
}
