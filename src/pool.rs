/*!
 * Fixed-size worker pool executing a transfer plan
 *
 * Workers pull chunk specs from a shared queue, so chunk-to-worker
 * assignment is dynamic. Each chunk runs read-then-upload under the retry
 * policy; the first exhausted chunk sets a cancellation flag that the other
 * workers observe at their next chunk boundary. In-flight chunks are never
 * interrupted.
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, TransferError};
use crate::planner::TransferPlan;
use crate::progress::TransferObserver;
use crate::provider::{ChunkResult, ObjectSink, ObjectSource};
use crate::retry::RetryPolicy;

/// Transfer every chunk in `plan`, returning results sorted by chunk index
///
/// Fails with the first chunk error; remaining queued chunks are abandoned.
/// The worker count is capped at the chunk count.
pub async fn run(
    plan: &TransferPlan,
    source: Arc<dyn ObjectSource>,
    sink: Arc<dyn ObjectSink>,
    workers: usize,
    retry: RetryPolicy,
    observer: Arc<dyn TransferObserver>,
) -> Result<Vec<ChunkResult>> {
    if plan.chunks.is_empty() {
        return Ok(Vec::new());
    }

    let workers = workers.min(plan.chunks.len()).max(1);
    let queue = Arc::new(Mutex::new(VecDeque::from(plan.chunks.clone())));
    let cancelled = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::unbounded_channel();

    debug!(workers, chunks = plan.chunk_count(), "starting worker pool");

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let cancelled = Arc::clone(&cancelled);
        let source = Arc::clone(&source);
        let sink = Arc::clone(&sink);
        let observer = Arc::clone(&observer);
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let spec = {
                    let mut queue = queue.lock().expect("chunk queue lock poisoned");
                    queue.pop_front()
                };
                let Some(spec) = spec else {
                    break;
                };

                let outcome = retry
                    .run(|| {
                        let source = Arc::clone(&source);
                        let sink = Arc::clone(&sink);
                        async move {
                            let data = source.read_range(spec.offset, spec.length).await?;
                            sink.upload_chunk(spec.index, data).await
                        }
                    })
                    .await;

                match outcome {
                    Ok(token) => {
                        observer.chunk_completed(spec.index, spec.length);
                        let _ = tx.send(Ok(ChunkResult {
                            index: spec.index,
                            token,
                            size: spec.length,
                        }));
                    }
                    Err(err) => {
                        warn!(chunk = spec.index, error = %err, "chunk failed, cancelling transfer");
                        cancelled.store(true, Ordering::SeqCst);
                        let _ = tx.send(Err(TransferError::ChunkTransferFailed {
                            index: spec.index,
                            source: Box::new(err),
                        }));
                        break;
                    }
                }
            }
        }));
    }
    drop(tx);

    let mut results = Vec::with_capacity(plan.chunk_count());
    let mut first_err = None;
    while let Some(item) = rx.recv().await {
        match item {
            Ok(result) => results.push(result),
            Err(err) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }
    for handle in handles {
        if let Err(join_err) = handle.await {
            if first_err.is_none() {
                first_err = Some(TransferError::Worker(join_err.to_string()));
            }
        }
    }

    if let Some(err) = first_err {
        return Err(err);
    }
    results.sort_by_key(|r| r.index);
    Ok(results)
}
