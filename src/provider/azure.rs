//! Azure Blob Storage bindings: ranged reads plus staged block commits
//!
//! Chunks are staged as uncommitted blocks whose identifiers derive from the
//! chunk index, then committed in index order with a single block list.
//! Uncommitted blocks left behind by a failed transfer expire server-side.

use std::env;

use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_core::StatusCode;
use azure_storage::StorageCredentials;
use azure_storage_blobs::blob::{BlobBlockType, BlockList};
use azure_storage_blobs::prelude::*;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use futures::StreamExt;
use tracing::debug;

use super::{ChunkResult, ChunkToken, ObjectSink, ObjectSource};
use crate::endpoint::Endpoint;
use crate::error::{Result, TransferError};

const ACCOUNT_ENV: &str = "AZURE_STORAGE_ACCOUNT";
const KEY_ENV: &str = "AZURE_STORAGE_KEY";

/// Build a blob client for an endpoint from the account named in the locator
/// (or the environment) and the shared key in the environment
fn blob_client(endpoint: &Endpoint) -> Result<BlobClient> {
    let account = match &endpoint.account {
        Some(account) => account.clone(),
        None => env::var(ACCOUNT_ENV).map_err(|_| {
            TransferError::InvalidLocator(format!(
                "azure locator names no storage account and {ACCOUNT_ENV} is not set"
            ))
        })?,
    };
    let key = env::var(KEY_ENV).map_err(|_| TransferError::Transport {
        provider: "azure",
        context: "credentials",
        message: format!("{KEY_ENV} is not set"),
        retryable: false,
    })?;
    let credentials = StorageCredentials::access_key(account.clone(), key);
    Ok(BlobServiceClient::new(account, credentials)
        .container_client(&endpoint.container)
        .blob_client(&endpoint.path))
}

/// Map an Azure SDK error, classifying throttling and server-side failures
/// as retryable
fn transport_err(context: &'static str, err: azure_core::error::Error) -> TransferError {
    let retryable = match err.kind() {
        ErrorKind::HttpResponse { status, .. } => {
            *status == StatusCode::TooManyRequests || u16::from(*status) >= 500
        }
        ErrorKind::Io => true,
        _ => false,
    };
    TransferError::Transport {
        provider: "azure",
        context,
        message: err.to_string(),
        retryable,
    }
}

fn is_not_found(err: &azure_core::error::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::HttpResponse { status, .. } if *status == StatusCode::NotFound
    )
}

/// Staged block identifier for a chunk index
///
/// Identifiers must be equal-length base64 within one blob; a zero-padded
/// decimal index satisfies that and makes retried uploads overwrite the same
/// block.
fn block_id(index: u32) -> String {
    BASE64.encode(format!("{index:08}"))
}

/// Source handler for an Azure blob
pub struct AzureSource {
    blob: BlobClient,
}

impl AzureSource {
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            blob: blob_client(endpoint)?,
        })
    }
}

#[async_trait]
impl ObjectSource for AzureSource {
    async fn size(&self) -> Result<u64> {
        let properties = self
            .blob
            .get_properties()
            .await
            .map_err(|e| transport_err("get_properties", e))?;
        Ok(properties.blob.properties.content_length)
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let mut stream = self.blob.get().range(offset..offset + length).into_stream();
        let mut out = Vec::with_capacity(length as usize);
        while let Some(response) = stream.next().await {
            let response = response.map_err(|e| transport_err("get_blob", e))?;
            let data = response
                .data
                .collect()
                .await
                .map_err(|e| transport_err("get_blob", e))?;
            out.extend_from_slice(&data);
        }
        Ok(Bytes::from(out))
    }

    async fn delete(&self) -> Result<()> {
        self.blob
            .delete()
            .await
            .map_err(|e| transport_err("delete_blob", e))?;
        Ok(())
    }
}

/// Destination handler for an Azure block blob
pub struct AzureSink {
    blob: BlobClient,
}

impl AzureSink {
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            blob: blob_client(endpoint)?,
        })
    }
}

#[async_trait]
impl ObjectSink for AzureSink {
    async fn upload_chunk(&self, index: u32, data: Bytes) -> Result<ChunkToken> {
        let id = block_id(index);
        self.blob
            .put_block(id.clone(), data)
            .await
            .map_err(|e| transport_err("put_block", e))?;
        Ok(ChunkToken::BlockId(id))
    }

    async fn finalize(&self, results: &[ChunkResult]) -> Result<()> {
        if results.is_empty() {
            // No blocks were staged; write the empty blob directly
            self.blob
                .put_block_blob(Bytes::new())
                .await
                .map_err(|e| transport_err("put_blob", e))?;
            return Ok(());
        }

        let mut blocks = Vec::with_capacity(results.len());
        for result in results {
            match &result.token {
                ChunkToken::BlockId(id) => {
                    blocks.push(BlobBlockType::Uncommitted(id.clone().into()));
                }
                other => {
                    return Err(TransferError::Transport {
                        provider: "azure",
                        context: "finalize",
                        message: format!("unexpected chunk token {other:?}"),
                        retryable: false,
                    })
                }
            }
        }
        debug!(blocks = blocks.len(), "committing block list");
        self.blob
            .put_block_list(BlockList { blocks })
            .await
            .map_err(|e| transport_err("put_block_list", e))?;
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        // Uncommitted blocks expire server-side; only a committed blob from
        // an earlier run would linger, so delete best-effort and tolerate a
        // blob that never existed
        match self.blob.delete().await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(transport_err("delete_blob", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ids_are_deterministic_and_uniform_length() {
        assert_eq!(block_id(0), BASE64.encode("00000000"));
        assert_eq!(block_id(7), block_id(7));
        let lengths: Vec<usize> = [0u32, 1, 42, 9_999, 49_999]
            .iter()
            .map(|&i| block_id(i).len())
            .collect();
        assert!(lengths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_block_ids_preserve_index_order() {
        // Zero-padded decimal sorts in numeric order even after encoding
        let ids: Vec<String> = (0..100).map(block_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
