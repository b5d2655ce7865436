//! strata — a server-side, content-addressed versioning engine for data
//! artifacts
//!
//! Users organize content in repositories, branch and merge it, stage
//! changes in per-user work-in-process areas, and commit immutable
//! snapshots. Object payloads live behind a pluggable blob adapter; all
//! metadata (trees, commits, branches, WIPs, merge requests) lives in a
//! transactional store consumed through traits.
//!
//! The crate is organized leaves-first:
//!
//! - [`hash`] / [`objects`] — MD5 content addressing and the tagged union
//!   of blobs, trees, commits and tags;
//! - [`store`] — the metadata and blob-adapter contracts plus in-memory and
//!   local-filesystem implementations;
//! - [`worktree`] — pure Merkle rewriting (insert/replace/remove with
//!   directory collapse) and the synchronized tree diff;
//! - [`history`] — lazy commit-graph iterators and merge-base computation;
//! - [`repo`] — the [`repo::WorkRepository`] orchestrator: checkout, WIP
//!   lifecycle, commit, and three-way merge.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata::repo::{init_repository, Operator, WorkRepository, WorkRepoState};
//! use strata::store::{MemoryBlock, MemoryMetadata, MetadataStore};
//!
//! # async fn demo() -> strata::Result<()> {
//! let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadata::new());
//! let operator = Operator::new(uuid::Uuid::new_v4(), "ann".into(), "ann@example.com".into());
//!
//! let (record, _main) = init_repository(&metadata, &operator, "dataset").await?;
//! let mut repo = WorkRepository::new(operator, record, metadata, Arc::new(MemoryBlock::new()));
//!
//! repo.checkout(WorkRepoState::InBranch, "main").await?;
//! repo.get_or_create_wip().await?;
//! repo.add_file("models/weights.bin", &mut &b"\x01\x02"[..], false).await?;
//! repo.commit_changes("add weights").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hash;
pub mod history;
pub mod objects;
pub mod repo;
pub mod store;
pub mod worktree;

pub use error::{Error, ErrorKind, Result};
pub use hash::Hash;
