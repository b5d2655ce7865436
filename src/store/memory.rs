//! In-memory metadata store
//!
//! Backs every store contract with mutex-guarded maps. This is the test
//! seam for the engine and the reference for how a relational
//! implementation must behave: object insert is idempotent and keeps the
//! first row, branch/WIP updates are compare-and-swap on the pre-image,
//! and transactions are serialized writers with rollback on error.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::objects::{Blob, Commit, Object, Tag, TreeNode};
use crate::store::metadata::{
    Branch, BranchStore, MergeRequest, MergeRequestStore, MergeStatus, MetadataStore, ObjectStore,
    RepositoryRecord, RepositoryStore, TxFn, Wip, WipStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    objects: Mutex<HashMap<(Uuid, Hash), Object>>,
    branches: Mutex<Vec<Branch>>,
    wips: Mutex<Vec<Wip>>,
    repositories: Mutex<Vec<RepositoryRecord>>,
    merge_requests: Mutex<Vec<MergeRequest>>,
}

impl Tables {
    fn snapshot(&self) -> Result<TablesSnapshot> {
        Ok(TablesSnapshot {
            objects: lock(&self.objects)?.clone(),
            branches: lock(&self.branches)?.clone(),
            wips: lock(&self.wips)?.clone(),
            repositories: lock(&self.repositories)?.clone(),
            merge_requests: lock(&self.merge_requests)?.clone(),
        })
    }

    fn restore(&self, snapshot: TablesSnapshot) -> Result<()> {
        *lock(&self.objects)? = snapshot.objects;
        *lock(&self.branches)? = snapshot.branches;
        *lock(&self.wips)? = snapshot.wips;
        *lock(&self.repositories)? = snapshot.repositories;
        *lock(&self.merge_requests)? = snapshot.merge_requests;
        Ok(())
    }
}

struct TablesSnapshot {
    objects: HashMap<(Uuid, Hash), Object>,
    branches: Vec<Branch>,
    wips: Vec<Wip>,
    repositories: Vec<RepositoryRecord>,
    merge_requests: Vec<MergeRequest>,
}

struct Inner {
    tables: Tables,
    tx_gate: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|err| Error::Transient(format!("lock poisoned: {err}")))
}

/// In-memory [`MetadataStore`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryMetadata {
    inner: Arc<Inner>,
    in_tx: bool,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        MemoryMetadata {
            inner: Arc::new(Inner {
                tables: Tables::default(),
                tx_gate: tokio::sync::Mutex::new(()),
            }),
            in_tx: false,
        }
    }
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadata {
    fn objects(&self, repository_id: Uuid) -> Arc<dyn ObjectStore> {
        Arc::new(MemoryObjects {
            inner: self.inner.clone(),
            repository_id,
        })
    }

    fn branches(&self) -> Arc<dyn BranchStore> {
        Arc::new(self.clone())
    }

    fn wips(&self) -> Arc<dyn WipStore> {
        Arc::new(self.clone())
    }

    fn repositories(&self) -> Arc<dyn RepositoryStore> {
        Arc::new(self.clone())
    }

    fn merge_requests(&self) -> Arc<dyn MergeRequestStore> {
        Arc::new(self.clone())
    }

    async fn transaction(&self, op: TxFn) -> Result<()> {
        if self.in_tx {
            // nested transactions flatten into the outer one
            return op(Arc::new(self.clone())).await;
        }

        let _guard = self.inner.tx_gate.lock().await;
        let snapshot = self.inner.tables.snapshot()?;
        let tx = MemoryMetadata {
            inner: self.inner.clone(),
            in_tx: true,
        };
        match op(Arc::new(tx)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.tables.restore(snapshot)?;
                Err(err)
            }
        }
    }
}

/// Object-store handle scoped to one repository.
struct MemoryObjects {
    inner: Arc<Inner>,
    repository_id: Uuid,
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    fn repository_id(&self) -> Uuid {
        self.repository_id
    }

    async fn insert(&self, object: Object) -> Result<Object> {
        if object.repository_id() != self.repository_id {
            return Err(Error::Invalid("repository id mismatch".to_string()));
        }
        let key = (self.repository_id, object.hash().clone());
        let mut objects = lock(&self.inner.tables.objects)?;
        // first writer wins; identical re-insert is a no-op
        let stored = objects.entry(key).or_insert(object);
        Ok(stored.clone())
    }

    async fn get(&self, hash: &Hash) -> Result<Object> {
        let objects = lock(&self.inner.tables.objects)?;
        objects
            .get(&(self.repository_id, hash.clone()))
            .cloned()
            .ok_or_else(|| Error::not_found("object", hash.to_hex()))
    }

    async fn blob(&self, hash: &Hash) -> Result<Blob> {
        match self.get(hash).await? {
            Object::Blob(blob) => Ok(blob),
            _ => Err(Error::not_found("blob", hash.to_hex())),
        }
    }

    async fn tree_node(&self, hash: &Hash) -> Result<TreeNode> {
        match self.get(hash).await? {
            Object::Tree(tree) => Ok(tree),
            _ => Err(Error::not_found("tree", hash.to_hex())),
        }
    }

    async fn commit(&self, hash: &Hash) -> Result<Commit> {
        match self.get(hash).await? {
            Object::Commit(commit) => Ok(commit),
            _ => Err(Error::not_found("commit", hash.to_hex())),
        }
    }

    async fn tag(&self, hash: &Hash) -> Result<Tag> {
        match self.get(hash).await? {
            Object::Tag(tag) => Ok(tag),
            _ => Err(Error::not_found("tag", hash.to_hex())),
        }
    }

    async fn tag_by_name(&self, name: &str) -> Result<Tag> {
        let objects = lock(&self.inner.tables.objects)?;
        objects
            .iter()
            .filter(|((repo, _), _)| *repo == self.repository_id)
            .find_map(|(_, object)| match object {
                Object::Tag(tag) if tag.name == name => Some(tag.clone()),
                _ => None,
            })
            .ok_or_else(|| Error::not_found("tag", name))
    }

    async fn count(&self) -> Result<usize> {
        let objects = lock(&self.inner.tables.objects)?;
        Ok(objects
            .keys()
            .filter(|(repo, _)| *repo == self.repository_id)
            .count())
    }

    async fn list(&self) -> Result<Vec<Object>> {
        let objects = lock(&self.inner.tables.objects)?;
        Ok(objects
            .iter()
            .filter(|((repo, _), _)| *repo == self.repository_id)
            .map(|(_, object)| object.clone())
            .collect())
    }
}

#[async_trait]
impl BranchStore for MemoryMetadata {
    async fn insert(&self, branch: Branch) -> Result<Branch> {
        let mut branches = lock(&self.inner.tables.branches)?;
        if branches
            .iter()
            .any(|b| b.repository_id == branch.repository_id && b.name == branch.name)
        {
            return Err(Error::already_exists("branch", &branch.name));
        }
        branches.push(branch.clone());
        Ok(branch)
    }

    async fn get(&self, repository_id: Uuid, name: &str) -> Result<Branch> {
        let branches = lock(&self.inner.tables.branches)?;
        branches
            .iter()
            .find(|b| b.repository_id == repository_id && b.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found("branch", name))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Branch> {
        let branches = lock(&self.inner.tables.branches)?;
        branches
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("branch", id.to_string()))
    }

    async fn list(&self, repository_id: Uuid) -> Result<Vec<Branch>> {
        let branches = lock(&self.inner.tables.branches)?;
        let mut matching: Vec<Branch> = branches
            .iter()
            .filter(|b| b.repository_id == repository_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }

    async fn update_commit_hash(&self, id: Uuid, expected: &Hash, new: &Hash) -> Result<()> {
        let mut branches = lock(&self.inner.tables.branches)?;
        let branch = branches
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::not_found("branch", id.to_string()))?;
        if &branch.commit_hash != expected {
            return Err(Error::StaleBase {
                expected: expected.to_hex(),
                actual: branch.commit_hash.to_hex(),
            });
        }
        branch.commit_hash = new.clone();
        branch.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, repository_id: Uuid, name: &str) -> Result<u64> {
        let mut branches = lock(&self.inner.tables.branches)?;
        let before = branches.len();
        branches.retain(|b| !(b.repository_id == repository_id && b.name == name));
        Ok((before - branches.len()) as u64)
    }
}

#[async_trait]
impl WipStore for MemoryMetadata {
    async fn insert(&self, wip: Wip) -> Result<Wip> {
        let mut wips = lock(&self.inner.tables.wips)?;
        if wips.iter().any(|w| {
            w.repository_id == wip.repository_id
                && w.ref_id == wip.ref_id
                && w.creator_id == wip.creator_id
        }) {
            return Err(Error::already_exists("wip", wip.id.to_string()));
        }
        wips.push(wip.clone());
        Ok(wip)
    }

    async fn get(&self, repository_id: Uuid, ref_id: Uuid, creator_id: Uuid) -> Result<Wip> {
        let wips = lock(&self.inner.tables.wips)?;
        wips.iter()
            .find(|w| {
                w.repository_id == repository_id
                    && w.ref_id == ref_id
                    && w.creator_id == creator_id
            })
            .cloned()
            .ok_or_else(|| Error::not_found("wip", ref_id.to_string()))
    }

    async fn list(&self, repository_id: Uuid, creator_id: Option<Uuid>) -> Result<Vec<Wip>> {
        let wips = lock(&self.inner.tables.wips)?;
        Ok(wips
            .iter()
            .filter(|w| {
                w.repository_id == repository_id
                    && creator_id.is_none_or(|creator| w.creator_id == creator)
            })
            .cloned()
            .collect())
    }

    async fn update_current_tree(&self, id: Uuid, expected: &Hash, new: &Hash) -> Result<()> {
        let mut wips = lock(&self.inner.tables.wips)?;
        let wip = wips
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::not_found("wip", id.to_string()))?;
        if &wip.current_tree != expected {
            return Err(Error::StaleBase {
                expected: expected.to_hex(),
                actual: wip.current_tree.to_hex(),
            });
        }
        wip.current_tree = new.clone();
        wip.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_on_commit(
        &self,
        id: Uuid,
        base_commit: &Hash,
        current_tree: &Hash,
    ) -> Result<()> {
        let mut wips = lock(&self.inner.tables.wips)?;
        let wip = wips
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::not_found("wip", id.to_string()))?;
        wip.base_commit = base_commit.clone();
        wip.current_tree = current_tree.clone();
        wip.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, repository_id: Uuid, ref_id: Uuid, creator_id: Uuid) -> Result<u64> {
        let mut wips = lock(&self.inner.tables.wips)?;
        let before = wips.len();
        wips.retain(|w| {
            !(w.repository_id == repository_id
                && w.ref_id == ref_id
                && w.creator_id == creator_id)
        });
        Ok((before - wips.len()) as u64)
    }
}

#[async_trait]
impl RepositoryStore for MemoryMetadata {
    async fn insert(&self, repository: RepositoryRecord) -> Result<RepositoryRecord> {
        let mut repositories = lock(&self.inner.tables.repositories)?;
        if repositories
            .iter()
            .any(|r| r.owner_id == repository.owner_id && r.name == repository.name)
        {
            return Err(Error::already_exists("repository", &repository.name));
        }
        repositories.push(repository.clone());
        Ok(repository)
    }

    async fn get(&self, owner_id: Uuid, name: &str) -> Result<RepositoryRecord> {
        let repositories = lock(&self.inner.tables.repositories)?;
        repositories
            .iter()
            .find(|r| r.owner_id == owner_id && r.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found("repository", name))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<RepositoryRecord> {
        let repositories = lock(&self.inner.tables.repositories)?;
        repositories
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("repository", id.to_string()))
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<RepositoryRecord>> {
        let repositories = lock(&self.inner.tables.repositories)?;
        Ok(repositories
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_head(&self, id: Uuid, head: &str) -> Result<()> {
        let mut repositories = lock(&self.inner.tables.repositories)?;
        let repository = repositories
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found("repository", id.to_string()))?;
        repository.head = head.to_string();
        repository.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, owner_id: Uuid, name: &str) -> Result<u64> {
        let mut repositories = lock(&self.inner.tables.repositories)?;
        let before = repositories.len();
        repositories.retain(|r| !(r.owner_id == owner_id && r.name == name));
        Ok((before - repositories.len()) as u64)
    }
}

#[async_trait]
impl MergeRequestStore for MemoryMetadata {
    async fn insert(&self, mut merge_request: MergeRequest) -> Result<MergeRequest> {
        let mut merge_requests = lock(&self.inner.tables.merge_requests)?;
        merge_request.sequence = merge_requests
            .iter()
            .filter(|mr| mr.repository_id == merge_request.repository_id)
            .count() as u64
            + 1;
        merge_requests.push(merge_request.clone());
        Ok(merge_request)
    }

    async fn get(&self, id: Uuid) -> Result<MergeRequest> {
        let merge_requests = lock(&self.inner.tables.merge_requests)?;
        merge_requests
            .iter()
            .find(|mr| mr.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("merge request", id.to_string()))
    }

    async fn list(&self, repository_id: Uuid) -> Result<Vec<MergeRequest>> {
        let merge_requests = lock(&self.inner.tables.merge_requests)?;
        Ok(merge_requests
            .iter()
            .filter(|mr| mr.repository_id == repository_id)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: MergeStatus) -> Result<()> {
        let mut merge_requests = lock(&self.inner.tables.merge_requests)?;
        let merge_request = merge_requests
            .iter_mut()
            .find(|mr| mr.id == id)
            .ok_or_else(|| Error::not_found("merge request", id.to_string()))?;
        merge_request.status = status;
        merge_request.updated_at = Utc::now();
        Ok(())
    }

    async fn set_assignee(&self, id: Uuid, assignee_id: Option<Uuid>) -> Result<()> {
        let mut merge_requests = lock(&self.inner.tables.merge_requests)?;
        let merge_request = merge_requests
            .iter_mut()
            .find(|mr| mr.id == id)
            .ok_or_else(|| Error::not_found("merge request", id.to_string()))?;
        merge_request.assignee_id = assignee_id;
        merge_request.updated_at = Utc::now();
        Ok(())
    }
}
