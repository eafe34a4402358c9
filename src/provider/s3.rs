//! AWS S3 bindings: ranged reads plus multipart upload sessions

use std::sync::OnceLock;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::{ChunkResult, ChunkToken, ObjectSink, ObjectSource};
use crate::endpoint::Endpoint;
use crate::error::{Result, TransferError};

/// Build an S3 client from the AWS default credential chain
async fn client() -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    Client::new(&config)
}

/// Map an SDK error, classifying timeouts/dispatch failures and throttling
/// responses as retryable
fn transport_err<E, R>(context: &'static str, err: SdkError<E, R>) -> TransferError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let retryable = matches!(
        &err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    );
    let message = DisplayErrorContext(&err).to_string();
    let retryable = retryable
        || message.contains("SlowDown")
        || message.contains("RequestTimeout")
        || message.contains("InternalError");
    TransferError::Transport {
        provider: "s3",
        context,
        message,
        retryable,
    }
}

/// A missing or negative Content-Length on head_object must fail the move
/// rather than plan a zero-byte transfer that would delete the source
fn require_content_length(value: Option<i64>) -> Result<u64> {
    match value {
        Some(length) if length >= 0 => Ok(length as u64),
        _ => Err(TransferError::Transport {
            provider: "s3",
            context: "head_object",
            message: "no content length returned".to_string(),
            retryable: false,
        }),
    }
}

/// Source handler for an S3 object
pub struct S3Source {
    client: Client,
    bucket: String,
    key: String,
}

impl S3Source {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            client: client().await,
            bucket: endpoint.container.clone(),
            key: endpoint.path.clone(),
        })
    }
}

#[async_trait]
impl ObjectSource for S3Source {
    async fn size(&self) -> Result<u64> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| transport_err("head_object", e))?;
        require_content_length(response.content_length())
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .range(range)
            .send()
            .await
            .map_err(|e| transport_err("get_object", e))?;
        let body = response.body.collect().await.map_err(|e| TransferError::Transport {
            provider: "s3",
            context: "get_object",
            message: format!("failed to collect response body: {e}"),
            retryable: true,
        })?;
        Ok(body.into_bytes())
    }

    async fn delete(&self) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| transport_err("delete_object", e))?;
        Ok(())
    }
}

/// Destination handler for an S3 object via a multipart upload session
pub struct S3Sink {
    client: Client,
    bucket: String,
    key: String,
    /// Multipart upload ID, set once in `open` and read-only afterwards
    upload_id: OnceLock<String>,
}

impl S3Sink {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            client: client().await,
            bucket: endpoint.container.clone(),
            key: endpoint.path.clone(),
            upload_id: OnceLock::new(),
        })
    }

    fn upload_id(&self) -> Result<&str> {
        self.upload_id
            .get()
            .map(String::as_str)
            .ok_or_else(|| TransferError::Transport {
                provider: "s3",
                context: "upload_part",
                message: "multipart upload session not opened".to_string(),
                retryable: false,
            })
    }
}

#[async_trait]
impl ObjectSink for S3Sink {
    async fn open(&self) -> Result<()> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| transport_err("create_multipart_upload", e))?;
        let upload_id = response
            .upload_id()
            .ok_or_else(|| TransferError::Transport {
                provider: "s3",
                context: "create_multipart_upload",
                message: "no upload ID returned".to_string(),
                retryable: false,
            })?
            .to_string();
        debug!(bucket = %self.bucket, key = %self.key, "multipart upload opened");
        self.upload_id.set(upload_id).ok();
        Ok(())
    }

    async fn upload_chunk(&self, index: u32, data: Bytes) -> Result<ChunkToken> {
        // Part numbers are 1-indexed on the wire and derive from the chunk
        // index, so a retried upload overwrites the same part
        let part_number = index as i32 + 1;
        let upload_id = self.upload_id()?.to_string();
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| transport_err("upload_part", e))?;
        let etag = response
            .e_tag()
            .ok_or_else(|| TransferError::Transport {
                provider: "s3",
                context: "upload_part",
                message: format!("no ETag returned for part {part_number}"),
                retryable: false,
            })?
            .trim_matches('"')
            .to_string();
        Ok(ChunkToken::ETag(etag))
    }

    async fn finalize(&self, results: &[ChunkResult]) -> Result<()> {
        if results.is_empty() {
            // Multipart uploads cannot complete with zero parts; discard the
            // session and write the empty object directly
            if let Ok(upload_id) = self.upload_id() {
                self.client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .upload_id(upload_id)
                    .send()
                    .await
                    .map_err(|e| transport_err("abort_multipart_upload", e))?;
            }
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(ByteStream::from_static(b""))
                .send()
                .await
                .map_err(|e| transport_err("put_object", e))?;
            return Ok(());
        }

        let mut parts = Vec::with_capacity(results.len());
        for result in results {
            let etag = match &result.token {
                ChunkToken::ETag(etag) => etag.clone(),
                other => {
                    return Err(TransferError::Transport {
                        provider: "s3",
                        context: "finalize",
                        message: format!("unexpected chunk token {other:?}"),
                        retryable: false,
                    })
                }
            };
            parts.push(
                CompletedPart::builder()
                    .part_number(result.index as i32 + 1)
                    .e_tag(etag)
                    .build(),
            );
        }
        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(self.upload_id()?)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| transport_err("complete_multipart_upload", e))?;
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        // Nothing to clean up if the session was never opened
        let Some(upload_id) = self.upload_id.get() else {
            return Ok(());
        };
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| transport_err("abort_multipart_upload", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_length_is_required() {
        assert_eq!(require_content_length(Some(42)).unwrap(), 42);
        assert_eq!(require_content_length(Some(0)).unwrap(), 0);

        let err = require_content_length(None).unwrap_err();
        assert!(!err.is_transient());
        assert!(matches!(err, TransferError::Transport { .. }));

        assert!(require_content_length(Some(-1)).is_err());
    }
}
