//! Provider capability interfaces for object sources and sinks
//!
//! Each provider exposes the same small surface the transfer core consumes:
//! metadata and ranged reads on the source side, chunk upload plus
//! finalize/abort on the destination side. The concrete variant is selected
//! once from the parsed endpoint and never branched on again inside the
//! worker pool or orchestrator.
//!
//! Authentication is resolved entirely inside each provider's own
//! default-credential mechanism; the core never receives or logs credential
//! material.

pub mod azure;
pub mod gcs;
pub mod memory;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::endpoint::{Endpoint, Provider};
use crate::error::Result;

pub use memory::{MemorySink, MemorySource};

/// Opaque per-chunk handle needed at finalize time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkToken {
    /// S3 multipart part ETag
    ETag(String),
    /// GCS temporary object name
    ObjectName(String),
    /// Azure staged block identifier (base64)
    BlockId(String),
}

/// Produced exactly once per successfully transferred chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: u32,
    pub token: ChunkToken,
    pub size: u64,
}

/// Read-side capabilities of a stored object
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Object size in bytes
    async fn size(&self) -> Result<u64>;

    /// Read bytes `[offset, offset + length)`
    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes>;

    /// Delete the source object (called only after a committed transfer)
    async fn delete(&self) -> Result<()>;
}

/// Write-side capabilities of a destination object
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Open the provider upload session, if one is required (S3 multipart
    /// init). The session handle is immutable once created.
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    /// Upload one chunk. The part/block identity derives from `index`, so a
    /// retried upload overwrites rather than duplicates.
    async fn upload_chunk(&self, index: u32, data: Bytes) -> Result<ChunkToken>;

    /// Commit the destination object from results ordered by chunk index
    async fn finalize(&self, results: &[ChunkResult]) -> Result<()>;

    /// Best-effort cleanup of partial destination artifacts
    async fn abort(&self) -> Result<()>;
}

/// Connect the source capability for a parsed endpoint
pub async fn connect_source(endpoint: &Endpoint) -> Result<Arc<dyn ObjectSource>> {
    Ok(match endpoint.provider {
        Provider::S3 => Arc::new(s3::S3Source::connect(endpoint).await?),
        Provider::Gcs => Arc::new(gcs::GcsSource::connect(endpoint).await?),
        Provider::Azure => Arc::new(azure::AzureSource::connect(endpoint)?),
    })
}

/// Connect the sink capability for a parsed endpoint
///
/// Construction is side-effect free; any provider session is opened later
/// via [`ObjectSink::open`] once planning has succeeded.
pub async fn connect_sink(endpoint: &Endpoint) -> Result<Arc<dyn ObjectSink>> {
    Ok(match endpoint.provider {
        Provider::S3 => Arc::new(s3::S3Sink::connect(endpoint).await?),
        Provider::Gcs => Arc::new(gcs::GcsSink::connect(endpoint).await?),
        Provider::Azure => Arc::new(azure::AzureSink::connect(endpoint)?),
    })
}
