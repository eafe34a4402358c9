//! Google Cloud Storage bindings: ranged reads plus compose-based assembly
//!
//! GCS has no multipart session. Chunks are uploaded as uniquely prefixed
//! temporary objects and composed into the final object at finalize time.
//! Compose joins at most [`GCS_COMPOSE_LIMIT`] objects per call, so larger
//! chunk counts run in sequential batches: the first batch composes into an
//! intermediate object, which is carried as the first source of the next
//! batch until one final object remains.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::compose::{ComposeObjectRequest, ComposingTargets};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::objects::SourceObjects;
use google_cloud_storage::http::Error as GcsHttpError;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChunkResult, ChunkToken, ObjectSink, ObjectSource};
use crate::endpoint::Endpoint;
use crate::error::{Result, TransferError};
use crate::planner::GCS_COMPOSE_LIMIT;

/// Build a GCS client from application-default credentials
async fn client() -> Result<Client> {
    let config = ClientConfig::default()
        .with_auth()
        .await
        .map_err(|e| TransferError::Transport {
            provider: "gcs",
            context: "credentials",
            message: e.to_string(),
            retryable: false,
        })?;
    Ok(Client::new(config))
}

fn transport_err(context: &'static str, err: GcsHttpError) -> TransferError {
    let retryable = match &err {
        GcsHttpError::Response(response) => response.code == 429 || response.code >= 500,
        GcsHttpError::HttpClient(_) => true,
        _ => false,
    };
    TransferError::Transport {
        provider: "gcs",
        context,
        message: err.to_string(),
        retryable,
    }
}

fn is_not_found(err: &GcsHttpError) -> bool {
    matches!(err, GcsHttpError::Response(response) if response.code == 404)
}

/// Source handler for a GCS object
pub struct GcsSource {
    client: Client,
    bucket: String,
    object: String,
}

impl GcsSource {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            client: client().await?,
            bucket: endpoint.container.clone(),
            object: endpoint.path.clone(),
        })
    }
}

#[async_trait]
impl ObjectSource for GcsSource {
    async fn size(&self) -> Result<u64> {
        let object = self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: self.object.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| transport_err("get_object", e))?;
        Ok(object.size as u64)
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: self.object.clone(),
                    ..Default::default()
                },
                // Range bounds are inclusive
                &Range(Some(offset), Some(offset + length - 1)),
            )
            .await
            .map_err(|e| transport_err("download_object", e))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self) -> Result<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: self.object.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| transport_err("delete_object", e))?;
        Ok(())
    }
}

/// One compose call: up to [`GCS_COMPOSE_LIMIT`] sources into a target
#[derive(Debug, PartialEq, Eq)]
struct ComposePass {
    sources: Vec<String>,
    target: String,
}

/// Plan the sequential compose batches for `parts` temporary objects
///
/// Each pass after the first carries the previous intermediate as its first
/// source; the last pass targets the final object name.
fn compose_passes(
    parts: &[String],
    limit: usize,
    final_object: &str,
    intermediate_prefix: &str,
) -> Vec<ComposePass> {
    if parts.len() <= limit {
        return vec![ComposePass {
            sources: parts.to_vec(),
            target: final_object.to_string(),
        }];
    }

    let mut passes = Vec::new();
    let (head, mut remaining) = parts.split_at(limit);
    let mut carried = format!("{intermediate_prefix}compose-0");
    passes.push(ComposePass {
        sources: head.to_vec(),
        target: carried.clone(),
    });

    while !remaining.is_empty() {
        let take = (limit - 1).min(remaining.len());
        let (head, tail) = remaining.split_at(take);
        let mut sources = Vec::with_capacity(take + 1);
        sources.push(carried.clone());
        sources.extend_from_slice(head);
        let target = if tail.is_empty() {
            final_object.to_string()
        } else {
            format!("{intermediate_prefix}compose-{}", passes.len())
        };
        passes.push(ComposePass {
            sources,
            target: target.clone(),
        });
        carried = target;
        remaining = tail;
    }

    passes
}

/// Destination handler for a GCS object assembled via compose
pub struct GcsSink {
    client: Client,
    bucket: String,
    final_object: String,
    /// Unique per-session prefix for temporary chunk objects
    part_prefix: String,
    /// Names created by this session, for abort cleanup
    uploaded: Mutex<BTreeSet<String>>,
}

impl GcsSink {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let part_prefix = format!("{}.part-{}-", endpoint.path, Uuid::new_v4().simple());
        Ok(Self {
            client: client().await?,
            bucket: endpoint.container.clone(),
            final_object: endpoint.path.clone(),
            part_prefix,
            uploaded: Mutex::new(BTreeSet::new()),
        })
    }

    /// Temporary object name for a chunk; deterministic per index so a
    /// retried upload overwrites the previous attempt
    fn part_name(&self, index: u32) -> String {
        format!("{}{:06}", self.part_prefix, index)
    }

    /// Record a session-created object so `abort` can delete it
    fn track(&self, name: String) {
        self.uploaded
            .lock()
            .expect("uploaded set lock poisoned")
            .insert(name);
    }

    async fn upload_object(&self, name: String, data: Bytes) -> Result<()> {
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &UploadType::Simple(Media::new(name)),
            )
            .await
            .map_err(|e| transport_err("upload_object", e))?;
        Ok(())
    }

    /// Delete a temporary object, tolerating objects that never landed
    async fn delete_temp(&self, name: &str) -> std::result::Result<(), String> {
        match self
            .client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: name.to_string(),
                ..Default::default()
            })
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(format!("delete {name}: {e}")),
        }
    }
}

#[async_trait]
impl ObjectSink for GcsSink {
    async fn upload_chunk(&self, index: u32, data: Bytes) -> Result<ChunkToken> {
        let name = self.part_name(index);
        self.upload_object(name.clone(), data).await?;
        self.track(name.clone());
        Ok(ChunkToken::ObjectName(name))
    }

    async fn finalize(&self, results: &[ChunkResult]) -> Result<()> {
        if results.is_empty() {
            // Zero-length object: nothing to compose
            return self
                .upload_object(self.final_object.clone(), Bytes::new())
                .await;
        }

        let mut parts = Vec::with_capacity(results.len());
        for result in results {
            match &result.token {
                ChunkToken::ObjectName(name) => parts.push(name.clone()),
                other => {
                    return Err(TransferError::Transport {
                        provider: "gcs",
                        context: "finalize",
                        message: format!("unexpected chunk token {other:?}"),
                        retryable: false,
                    })
                }
            }
        }

        let passes = compose_passes(
            &parts,
            GCS_COMPOSE_LIMIT,
            &self.final_object,
            &self.part_prefix,
        );
        debug!(parts = parts.len(), passes = passes.len(), "composing destination object");

        let mut temporaries = BTreeSet::new();
        for pass in &passes {
            let source_objects = pass
                .sources
                .iter()
                .map(|name| SourceObjects {
                    name: name.clone(),
                    ..Default::default()
                })
                .collect();
            self.client
                .compose_object(&ComposeObjectRequest {
                    bucket: self.bucket.clone(),
                    destination_object: pass.target.clone(),
                    composing_targets: ComposingTargets {
                        source_objects,
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .await
                .map_err(|e| transport_err("compose_object", e))?;
            temporaries.extend(pass.sources.iter().cloned());
            if pass.target != self.final_object {
                // An intermediate exists in the bucket the moment its pass
                // completes; abort must be able to delete it if a later
                // pass fails
                self.track(pass.target.clone());
                temporaries.insert(pass.target.clone());
            }
        }

        // The destination is committed; temporary cleanup failures are
        // surfaced but must not fail the move
        for name in &temporaries {
            if let Err(detail) = self.delete_temp(name).await {
                warn!(%detail, "failed to delete temporary object");
            }
        }
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        let names: Vec<String> = {
            let uploaded = self.uploaded.lock().expect("uploaded set lock poisoned");
            uploaded.iter().cloned().collect()
        };
        let mut failures = Vec::new();
        for name in &names {
            if let Err(detail) = self.delete_temp(name).await {
                failures.push(detail);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TransferError::Transport {
                provider: "gcs",
                context: "abort",
                message: failures.join("; "),
                retryable: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn part_names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("obj.part-x-{i:06}")).collect()
    }

    fn offline_sink() -> GcsSink {
        GcsSink {
            client: Client::new(ClientConfig::default().anonymous()),
            bucket: "bucket".to_string(),
            final_object: "final".to_string(),
            part_prefix: "final.part-x-".to_string(),
            uploaded: Mutex::new(BTreeSet::new()),
        }
    }

    #[test]
    fn test_single_pass_when_under_limit() {
        let parts = part_names(32);
        let passes = compose_passes(&parts, 32, "final", "obj.part-x-");
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].sources, parts);
        assert_eq!(passes[0].target, "final");
    }

    #[test]
    fn test_seventy_parts_need_three_passes() {
        let parts = part_names(70);
        let passes = compose_passes(&parts, 32, "final", "obj.part-x-");
        // 32, then intermediate + 31, then intermediate + 7
        assert_eq!(passes.len(), 3);
        assert_eq!(passes[0].sources.len(), 32);
        assert_eq!(passes[1].sources.len(), 32);
        assert_eq!(passes[1].sources[0], passes[0].target);
        assert_eq!(passes[2].sources.len(), 8);
        assert_eq!(passes[2].sources[0], passes[1].target);
        assert_eq!(passes[2].target, "final");
    }

    #[test]
    fn test_every_pass_respects_the_limit() {
        for count in [33, 63, 64, 65, 100, 1000] {
            let parts = part_names(count);
            let passes = compose_passes(&parts, 32, "final", "p-");
            for pass in &passes {
                assert!(pass.sources.len() <= 32, "{count} parts: pass too wide");
            }
            assert_eq!(passes.last().unwrap().target, "final");
        }
    }

    #[test]
    fn test_intermediates_enter_the_abort_set_as_passes_complete() {
        let sink = offline_sink();
        let parts = part_names(70);
        let passes = compose_passes(
            &parts,
            GCS_COMPOSE_LIMIT,
            &sink.final_object,
            &sink.part_prefix,
        );
        assert_eq!(passes.len(), 3);

        // Two passes complete, the third fails before running: both
        // intermediates already exist in the bucket and must be visible to
        // abort for deletion
        for pass in &passes[..2] {
            if pass.target != sink.final_object {
                sink.track(pass.target.clone());
            }
        }
        let tracked = sink.uploaded.lock().unwrap();
        assert!(tracked.contains(&passes[0].target));
        assert!(tracked.contains(&passes[1].target));
        assert!(!tracked.contains(&sink.final_object));
    }

    #[test]
    fn test_composition_preserves_order_and_covers_all_parts() {
        // Simulate the compose passes over in-memory objects and verify the
        // final object is the ordered concatenation of every part
        let parts = part_names(70);
        let passes = compose_passes(&parts, 32, "final", "p-");

        let mut store: HashMap<String, Vec<usize>> = parts
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), vec![i]))
            .collect();
        for pass in &passes {
            let mut combined = Vec::new();
            for source in &pass.sources {
                combined.extend(store.get(source).expect("missing compose source"));
            }
            store.insert(pass.target.clone(), combined);
        }

        let expected: Vec<usize> = (0..70).collect();
        assert_eq!(store.get("final"), Some(&expected));

        // All temporaries (parts and intermediates) are known for deletion
        let mut temporaries: BTreeSet<String> = BTreeSet::new();
        for pass in &passes {
            temporaries.extend(pass.sources.iter().cloned());
            if pass.target != "final" {
                temporaries.insert(pass.target.clone());
            }
        }
        for part in &parts {
            assert!(temporaries.contains(part));
        }
    }
}
