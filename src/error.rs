//! Error types for nimbus transfers

use std::io;
use thiserror::Error;

/// Result type alias for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Errors that can occur while moving an object between providers
#[derive(Error, Debug)]
pub enum TransferError {
    /// Locator string could not be parsed into an endpoint
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// Chunk size or chunk count violates a provider constraint
    #[error("invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    /// Provider transport failure; `retryable` marks transient errors
    /// (timeouts, throttling) that the retry policy may absorb
    #[error("{provider} error during {context}: {message}")]
    Transport {
        provider: &'static str,
        context: &'static str,
        message: String,
        retryable: bool,
    },

    /// A chunk exhausted its retry budget or hit a non-transient error
    #[error("chunk {index} transfer failed: {source}")]
    ChunkTransferFailed {
        index: u32,
        #[source]
        source: Box<TransferError>,
    },

    /// Destination commit failed after all chunks were uploaded
    #[error("finalize failed: {source}")]
    FinalizeFailed {
        #[source]
        source: Box<TransferError>,
    },

    /// Cleanup during abort failed; carries the original error so cleanup
    /// problems never mask the failure that triggered the abort
    #[error("{source}; cleanup also failed: {}", .cleanup.join("; "))]
    CleanupFailed {
        #[source]
        source: Box<TransferError>,
        cleanup: Vec<String>,
    },

    /// The destination is committed but the source object survived
    /// deletion; reported as a warning on an otherwise successful move
    #[error("source object was copied but could not be deleted: {0}")]
    SourceCleanupFailed(String),

    /// A worker task panicked or was torn down unexpectedly
    #[error("worker task failed: {0}")]
    Worker(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::Transport { retryable, .. } => *retryable,
            TransferError::Io(io_err) => Self::is_io_transient(io_err),
            _ => false,
        }
    }

    /// Check if an I/O error is transient
    fn is_io_transient(io_err: &io::Error) -> bool {
        use io::ErrorKind::*;
        matches!(
            io_err.kind(),
            ConnectionRefused
                | ConnectionReset
                | ConnectionAborted
                | NotConnected
                | BrokenPipe
                | TimedOut
                | Interrupted
                | WouldBlock
        )
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TransferError::InvalidLocator(_) | TransferError::InvalidChunkConfig(_) => EXIT_FATAL,
            TransferError::CleanupFailed { source, .. } => source.exit_code(),
            _ => EXIT_PARTIAL,
        }
    }

    /// Attach a cleanup failure to this error without masking it
    pub fn with_cleanup_failure(self, detail: String) -> TransferError {
        match self {
            TransferError::CleanupFailed { source, mut cleanup } => {
                cleanup.push(detail);
                TransferError::CleanupFailed { source, cleanup }
            }
            other => TransferError::CleanupFailed {
                source: Box::new(other),
                cleanup: vec![detail],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(retryable: bool) -> TransferError {
        TransferError::Transport {
            provider: "s3",
            context: "read_range",
            message: "connection reset".to_string(),
            retryable,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(transport(true).is_transient());
        assert!(!transport(false).is_transient());
        assert!(!TransferError::InvalidLocator("x".to_string()).is_transient());

        let io_err = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert!(TransferError::Io(io_err).is_transient());

        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        assert!(!TransferError::Io(io_err).is_transient());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            TransferError::InvalidLocator("ftp://x".to_string()).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(transport(false).exit_code(), EXIT_PARTIAL);
    }

    #[test]
    fn test_cleanup_never_masks_original() {
        let original = TransferError::ChunkTransferFailed {
            index: 2,
            source: Box::new(transport(false)),
        };
        let err = original
            .with_cleanup_failure("abort failed".to_string())
            .with_cleanup_failure("temp delete failed".to_string());

        match err {
            TransferError::CleanupFailed { source, cleanup } => {
                assert!(matches!(
                    *source,
                    TransferError::ChunkTransferFailed { index: 2, .. }
                ));
                assert_eq!(cleanup.len(), 2);
            }
            other => panic!("expected CleanupFailed, got {other}"),
        }
    }

    #[test]
    fn test_cleanup_display_keeps_original_message() {
        let err = transport(false).with_cleanup_failure("abort failed".to_string());
        let text = err.to_string();
        assert!(text.contains("connection reset"));
        assert!(text.contains("abort failed"));
    }
}
