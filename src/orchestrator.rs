/*!
 * Move orchestration: plan, transfer, finalize, clean up
 *
 * The orchestrator owns the transfer lifecycle. Failures before any chunk
 * moves leave no side effects; failures during transfer or finalize trigger
 * destination abort, with cleanup errors attached to (never masking) the
 * original failure. Source deletion failure after a committed destination is
 * a warning on a successful outcome, not an error.
 */

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MoveConfig;
use crate::endpoint::{Endpoint, Provider};
use crate::error::{Result, TransferError};
use crate::planner::TransferPlan;
use crate::pool;
use crate::progress::TransferObserver;
use crate::provider::{connect_sink, connect_source, ObjectSink, ObjectSource};

/// Lifecycle phase of a move, for logs and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Planning,
    InProgress,
    Finalizing,
    Completed,
    Aborting,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Planning => "planning",
            TransferState::InProgress => "in-progress",
            TransferState::Finalizing => "finalizing",
            TransferState::Completed => "completed",
            TransferState::Aborting => "aborting",
            TransferState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a completed move
#[derive(Debug)]
pub struct MoveOutcome {
    pub bytes_moved: u64,
    pub chunks: usize,
    /// False when the destination committed but the source survived
    pub source_deleted: bool,
    /// Set when the move succeeded with a non-fatal cleanup problem
    pub warning: Option<TransferError>,
}

/// Move the object at `source` to `destination`, deleting the source on
/// success
pub async fn move_object(
    source: &str,
    destination: &str,
    config: &MoveConfig,
    observer: Arc<dyn TransferObserver>,
) -> Result<MoveOutcome> {
    let src = Endpoint::parse(source)?;
    let dst = Endpoint::parse(destination)?;
    info!(source = %src, destination = %dst, "starting move");

    let source = connect_source(&src).await?;
    let sink = connect_sink(&dst).await?;
    move_between(source, sink, dst.provider, config, observer).await
}

/// Move between already-connected endpoints
///
/// Split out from [`move_object`] so the transfer lifecycle can run against
/// any [`ObjectSource`]/[`ObjectSink`] pair.
pub async fn move_between(
    source: Arc<dyn ObjectSource>,
    sink: Arc<dyn ObjectSink>,
    destination: Provider,
    config: &MoveConfig,
    observer: Arc<dyn TransferObserver>,
) -> Result<MoveOutcome> {
    debug!(state = %TransferState::Planning, "transfer state");
    config.validate()?;
    let total_size = source.size().await?;
    let plan = TransferPlan::build(total_size, config.chunk_size, destination)?;
    info!(
        total_size,
        chunks = plan.chunk_count(),
        chunk_size = plan.chunk_size,
        "transfer planned"
    );
    observer.transfer_started(total_size, plan.chunk_count());
    sink.open().await?;

    debug!(state = %TransferState::InProgress, "transfer state");
    let results = match pool::run(
        &plan,
        Arc::clone(&source),
        Arc::clone(&sink),
        config.threads,
        config.retry_policy(),
        Arc::clone(&observer),
    )
    .await
    {
        Ok(results) => results,
        Err(err) => return Err(abort_destination(&sink, err).await),
    };

    debug!(state = %TransferState::Finalizing, "transfer state");
    if let Err(err) = sink.finalize(&results).await {
        let wrapped = TransferError::FinalizeFailed {
            source: Box::new(err),
        };
        return Err(abort_destination(&sink, wrapped).await);
    }

    // The destination is committed; from here the move cannot fail
    let mut source_deleted = true;
    let mut warning = None;
    if let Err(err) = source.delete().await {
        warn!(error = %err, "destination committed but source deletion failed");
        source_deleted = false;
        warning = Some(TransferError::SourceCleanupFailed(err.to_string()));
    }

    observer.transfer_completed();
    debug!(state = %TransferState::Completed, "transfer state");
    info!(bytes = total_size, chunks = plan.chunk_count(), "move complete");

    Ok(MoveOutcome {
        bytes_moved: total_size,
        chunks: plan.chunk_count(),
        source_deleted,
        warning,
    })
}

/// Abort the destination after `original`, attaching any cleanup failure
/// without masking the original error
async fn abort_destination(sink: &Arc<dyn ObjectSink>, original: TransferError) -> TransferError {
    debug!(state = %TransferState::Aborting, "transfer state");
    let result = match sink.abort().await {
        Ok(()) => original,
        Err(cleanup) => {
            warn!(error = %cleanup, "destination cleanup failed during abort");
            original.with_cleanup_failure(cleanup.to_string())
        }
    };
    debug!(state = %TransferState::Failed, "transfer state");
    result
}
