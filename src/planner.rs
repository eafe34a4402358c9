/*!
 * Chunk planning for a single object transfer
 */

use crate::endpoint::Provider;
use crate::error::{Result, TransferError};

/// Default chunk size: 64 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// S3 multipart parts must be at least 5 MiB, except the final part
pub const S3_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// S3 multipart uploads allow at most 10,000 parts
pub const S3_MAX_PARTS: u64 = 10_000;

/// Azure block blobs allow at most 50,000 committed blocks
pub const AZURE_MAX_BLOCKS: u64 = 50_000;

/// GCS compose joins at most 32 objects per call; larger chunk counts are
/// finalized in sequential compose batches, so no hard plan limit applies
pub const GCS_COMPOSE_LIMIT: usize = 32;

/// One contiguous byte range of the source object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    /// 0-based, contiguous chunk index
    pub index: u32,
    pub offset: u64,
    pub length: u64,
}

/// Ordered chunk layout for a transfer
///
/// Chunks are contiguous, non-overlapping, and sum exactly to `total_size`.
/// Identical inputs always produce an identical plan.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunks: Vec<ChunkSpec>,
}

impl TransferPlan {
    /// Compute the chunk layout for `total_size` bytes, validating the
    /// destination provider's part constraints before any network call
    pub fn build(total_size: u64, chunk_size: u64, destination: Provider) -> Result<Self> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        let chunk_count = total_size.div_ceil(chunk_size);

        if destination == Provider::S3 && chunk_count > 1 && chunk_size < S3_MIN_PART_SIZE {
            return Err(TransferError::InvalidChunkConfig(format!(
                "chunk size {chunk_size} is below the S3 minimum part size of \
                 {S3_MIN_PART_SIZE} bytes"
            )));
        }

        let max_parts = match destination {
            Provider::S3 => Some(S3_MAX_PARTS),
            Provider::Azure => Some(AZURE_MAX_BLOCKS),
            Provider::Gcs => None,
        };
        if let Some(max) = max_parts {
            if chunk_count > max {
                return Err(TransferError::InvalidChunkConfig(format!(
                    "{chunk_count} chunks exceed the {destination} limit of {max} parts; \
                     increase the chunk size"
                )));
            }
        }

        let mut chunks = Vec::with_capacity(chunk_count as usize);
        let mut offset = 0;
        while offset < total_size {
            let length = chunk_size.min(total_size - offset);
            chunks.push(ChunkSpec {
                index: chunks.len() as u32,
                offset,
                length,
            });
            offset += length;
        }

        Ok(Self {
            total_size,
            chunk_size,
            chunks,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
