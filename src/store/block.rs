//! Blob adapter: pluggable payload storage
//!
//! Object bytes live outside the metadata store, behind this contract.
//! `put` streams a payload, computes its MD5 checksum on the way through,
//! and places it content-addressed under the caller's namespace; the
//! physical layout (`<namespace>/<hex[..2]>/<hex>`) is the adapter's
//! concern and callers only ever hand back the checksum. Partial writes are
//! harmless: a payload that never got recorded in the metadata store is an
//! orphan, not a corruption.
//!
//! Two adapters ship here: in-memory (tests) and local filesystem. Cloud
//! adapters plug into the same trait.

use crate::error::{Error, Result};
use crate::hash::Hash;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Result of streaming a payload into the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub size: i64,
    pub check_sum: Hash,
}

/// Metadata about a stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStat {
    pub size: i64,
    pub check_sum: Hash,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignOp {
    Read,
    Write,
}

/// Payload storage contract consumed by the engine.
#[async_trait]
pub trait BlockAdapter: Send + Sync {
    /// URI scheme this adapter serves, e.g. `mem` or `local`.
    fn scheme(&self) -> &str;

    /// Stream a payload in, returning its size and content checksum. The
    /// payload becomes addressable by `(namespace, check_sum)`.
    async fn put(
        &self,
        namespace: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<UploadInfo>;

    /// Fetch a payload, optionally restricted to a half-open byte range.
    async fn get(
        &self,
        namespace: &str,
        check_sum: &Hash,
        range: Option<(u64, u64)>,
    ) -> Result<Bytes>;

    async fn stat(&self, namespace: &str, check_sum: &Hash) -> Result<BlockStat>;

    /// Pre-signed URL for direct client access. Optional.
    async fn presign(&self, _namespace: &str, _check_sum: &Hash, _op: PresignOp) -> Result<String> {
        Err(Error::Invalid("presign not supported".to_string()))
    }
}

/// Relative key for a payload under its namespace.
fn object_key(namespace: &str, check_sum: &Hash) -> String {
    let hex = check_sum.to_hex();
    format!("{}/{}/{}", namespace, &hex[..2.min(hex.len())], hex)
}

async fn drain_reader(
    reader: &mut (dyn AsyncRead + Send + Unpin),
) -> Result<(Vec<u8>, UploadInfo)> {
    let mut context = md5::Context::new();
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
        data.extend_from_slice(&buf[..n]);
    }
    let check_sum = Hash::new(context.compute().0.to_vec());
    let size = data.len() as i64;
    Ok((data, UploadInfo { size, check_sum }))
}

fn slice_range(data: &Bytes, range: Option<(u64, u64)>) -> Result<Bytes> {
    match range {
        None => Ok(data.clone()),
        Some((start, end)) => {
            let len = data.len() as u64;
            if start > end || end > len {
                return Err(Error::Invalid(format!(
                    "byte range {start}..{end} out of bounds for {len} bytes"
                )));
            }
            Ok(data.slice(start as usize..end as usize))
        }
    }
}

/// In-memory adapter, the test double.
#[derive(Default)]
pub struct MemoryBlock {
    payloads: Mutex<HashMap<String, (Bytes, DateTime<Utc>)>>,
}

impl MemoryBlock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockAdapter for MemoryBlock {
    fn scheme(&self) -> &str {
        "mem"
    }

    async fn put(
        &self,
        namespace: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<UploadInfo> {
        let (data, info) = drain_reader(reader).await?;
        let key = object_key(namespace, &info.check_sum);
        let mut payloads = self
            .payloads
            .lock()
            .map_err(|err| Error::Transient(format!("lock poisoned: {err}")))?;
        payloads.insert(key, (Bytes::from(data), Utc::now()));
        Ok(info)
    }

    async fn get(
        &self,
        namespace: &str,
        check_sum: &Hash,
        range: Option<(u64, u64)>,
    ) -> Result<Bytes> {
        let payloads = self
            .payloads
            .lock()
            .map_err(|err| Error::Transient(format!("lock poisoned: {err}")))?;
        let (data, _) = payloads
            .get(&object_key(namespace, check_sum))
            .ok_or_else(|| Error::not_found("payload", check_sum.to_hex()))?;
        slice_range(data, range)
    }

    async fn stat(&self, namespace: &str, check_sum: &Hash) -> Result<BlockStat> {
        let payloads = self
            .payloads
            .lock()
            .map_err(|err| Error::Transient(format!("lock poisoned: {err}")))?;
        let (data, modified) = payloads
            .get(&object_key(namespace, check_sum))
            .ok_or_else(|| Error::not_found("payload", check_sum.to_hex()))?;
        Ok(BlockStat {
            size: data.len() as i64,
            check_sum: check_sum.clone(),
            last_modified: *modified,
        })
    }
}

/// Local-filesystem adapter. Payloads are written to a temporary file and
/// renamed into place so concurrent writers of the same content race
/// harmlessly.
pub struct LocalBlock {
    root: PathBuf,
}

impl LocalBlock {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalBlock { root: root.into() }
    }

    fn payload_path(&self, namespace: &str, check_sum: &Hash) -> PathBuf {
        self.root.join(object_key(namespace, check_sum))
    }
}

#[async_trait]
impl BlockAdapter for LocalBlock {
    fn scheme(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        namespace: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<UploadInfo> {
        let staging_dir = self.root.join(namespace).join("staging");
        tokio::fs::create_dir_all(&staging_dir).await?;
        let temp_path = staging_dir.join(format!("tmp-blk-{}", Uuid::new_v4().simple()));

        let mut context = md5::Context::new();
        let mut size: i64 = 0;
        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            context.consume(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            size += n as i64;
        }
        file.flush().await?;
        drop(file);

        let check_sum = Hash::new(context.compute().0.to_vec());
        let final_path = self.payload_path(namespace, &check_sum);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&temp_path, &final_path).await?;

        Ok(UploadInfo { size, check_sum })
    }

    async fn get(
        &self,
        namespace: &str,
        check_sum: &Hash,
        range: Option<(u64, u64)>,
    ) -> Result<Bytes> {
        let path = self.payload_path(namespace, check_sum);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|_| Error::not_found("payload", check_sum.to_hex()))?;
        slice_range(&Bytes::from(data), range)
    }

    async fn stat(&self, namespace: &str, check_sum: &Hash) -> Result<BlockStat> {
        let path = self.payload_path(namespace, check_sum);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| Error::not_found("payload", check_sum.to_hex()))?;
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(BlockStat {
            size: metadata.len() as i64,
            check_sum: check_sum.clone(),
            last_modified,
        })
    }
}

/// Blob-adapter selection, deserializable from service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AdapterConfig {
    Memory,
    Local { root: PathBuf },
}

impl AdapterConfig {
    pub fn build(&self) -> Arc<dyn BlockAdapter> {
        match self {
            AdapterConfig::Memory => Arc::new(MemoryBlock::new()),
            AdapterConfig::Local { root } => Arc::new(LocalBlock::new(root.clone())),
        }
    }
}
