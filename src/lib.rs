/*!
 * nimbus - move objects between cloud storage providers
 *
 * Moves a single object from one provider (S3, GCS, Azure Blob Storage) to
 * another: the object is split into a deterministic chunk plan, chunks are
 * streamed concurrently by a fixed worker pool with per-chunk retry, the
 * destination is committed atomically via the provider's assembly mechanism
 * (multipart complete, compose, block list), and the source is deleted once
 * the destination is durable.
 *
 * Credentials are resolved by each provider's own default mechanism and
 * never pass through this crate's API.
 */

pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod provider;
pub mod retry;

pub use config::MoveConfig;
pub use endpoint::{Endpoint, Provider};
pub use error::{Result, TransferError, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};
pub use orchestrator::{move_between, move_object, MoveOutcome, TransferState};
pub use planner::{ChunkSpec, TransferPlan, DEFAULT_CHUNK_SIZE};
pub use progress::{NoopObserver, ProgressBarObserver, TransferObserver};
pub use provider::{
    ChunkResult, ChunkToken, MemorySink, MemorySource, ObjectSink, ObjectSource,
};
pub use retry::RetryPolicy;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
