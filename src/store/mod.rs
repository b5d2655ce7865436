//! Consumed storage interfaces and their reference implementations
//!
//! Metadata (entities, object rows, transactions) and payload bytes (blob
//! adapter) are two separate stores; the engine is written against the
//! traits and never against an implementation.

pub mod block;
pub mod memory;
pub mod metadata;

pub use block::{AdapterConfig, BlockAdapter, BlockStat, LocalBlock, MemoryBlock, PresignOp, UploadInfo};
pub use memory::MemoryMetadata;
pub use metadata::{
    Branch, BranchStore, MergeRequest, MergeRequestStore, MergeStatus, MetadataStore, ObjectStore,
    RepositoryRecord, RepositoryStore, TxFn, Wip, WipState, WipStore,
};
