//! In-memory source/sink doubles for exercising the transfer core
//!
//! Both sides support scripted fault injection so tests can drive retry,
//! abort, and cleanup paths without any network provider.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ChunkResult, ChunkToken, ObjectSink, ObjectSource};
use crate::error::{Result, TransferError};

/// A scripted failure that fires a fixed number of times
#[derive(Debug, Clone, Copy)]
struct Fault {
    remaining: u32,
    retryable: bool,
}

impl Fault {
    /// Consume one firing; returns the error to raise, or `None` once spent
    fn fire(&mut self, context: &'static str) -> Option<TransferError> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(TransferError::Transport {
            provider: "memory",
            context,
            message: "injected fault".to_string(),
            retryable: self.retryable,
        })
    }
}

/// In-memory object readable by offset
pub struct MemorySource {
    data: Vec<u8>,
    deleted: AtomicBool,
    fail_delete: AtomicBool,
    read_faults: Mutex<HashMap<u64, Fault>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            deleted: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            read_faults: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `times` reads starting at `offset`
    pub fn fail_reads(&self, offset: u64, times: u32, retryable: bool) {
        self.read_faults
            .lock()
            .expect("read fault lock poisoned")
            .insert(
                offset,
                Fault {
                    remaining: times,
                    retryable,
                },
            );
    }

    /// Make `delete` return an error
    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[async_trait]
impl ObjectSource for MemorySource {
    async fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        if let Some(fault) = self
            .read_faults
            .lock()
            .expect("read fault lock poisoned")
            .get_mut(&offset)
        {
            if let Some(err) = fault.fire("read_range") {
                return Err(err);
            }
        }
        let start = offset as usize;
        let end = (offset + length) as usize;
        if end > self.data.len() {
            return Err(TransferError::Transport {
                provider: "memory",
                context: "read_range",
                message: format!("range {start}..{end} exceeds object size {}", self.data.len()),
                retryable: false,
            });
        }
        Ok(Bytes::copy_from_slice(&self.data[start..end]))
    }

    async fn delete(&self) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(TransferError::Transport {
                provider: "memory",
                context: "delete",
                message: "injected delete fault".to_string(),
                retryable: false,
            });
        }
        self.deleted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory destination that stages chunks and commits on finalize
pub struct MemorySink {
    staged: Mutex<BTreeMap<u32, Vec<u8>>>,
    committed: Mutex<Option<Vec<u8>>>,
    opened: AtomicBool,
    aborted: AtomicBool,
    upload_faults: Mutex<HashMap<u32, Fault>>,
    finalize_fault: Mutex<Option<Fault>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            staged: Mutex::new(BTreeMap::new()),
            committed: Mutex::new(None),
            opened: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            upload_faults: Mutex::new(HashMap::new()),
            finalize_fault: Mutex::new(None),
        }
    }

    /// Fail the next `times` uploads of chunk `index`
    pub fn fail_uploads(&self, index: u32, times: u32, retryable: bool) {
        self.upload_faults
            .lock()
            .expect("upload fault lock poisoned")
            .insert(
                index,
                Fault {
                    remaining: times,
                    retryable,
                },
            );
    }

    /// Fail the next finalize call
    pub fn fail_finalize(&self) {
        *self.finalize_fault.lock().expect("finalize fault lock poisoned") = Some(Fault {
            remaining: 1,
            retryable: false,
        });
    }

    /// Committed object contents, if finalize succeeded
    pub fn committed_bytes(&self) -> Option<Vec<u8>> {
        self.committed.lock().expect("committed lock poisoned").clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn was_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of distinct chunks currently staged
    pub fn staged_count(&self) -> usize {
        self.staged.lock().expect("staged lock poisoned").len()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectSink for MemorySink {
    async fn open(&self) -> Result<()> {
        self.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_chunk(&self, index: u32, data: Bytes) -> Result<ChunkToken> {
        if let Some(fault) = self
            .upload_faults
            .lock()
            .expect("upload fault lock poisoned")
            .get_mut(&index)
        {
            if let Some(err) = fault.fire("upload_chunk") {
                return Err(err);
            }
        }
        // A retried chunk overwrites the previous staging, never duplicates
        self.staged
            .lock()
            .expect("staged lock poisoned")
            .insert(index, data.to_vec());
        Ok(ChunkToken::ObjectName(format!("chunk-{index:06}")))
    }

    async fn finalize(&self, results: &[ChunkResult]) -> Result<()> {
        if let Some(fault) = self
            .finalize_fault
            .lock()
            .expect("finalize fault lock poisoned")
            .as_mut()
        {
            if let Some(err) = fault.fire("finalize") {
                return Err(err);
            }
        }
        let staged = self.staged.lock().expect("staged lock poisoned");
        let mut assembled = Vec::new();
        for result in results {
            let data = staged.get(&result.index).ok_or_else(|| TransferError::Transport {
                provider: "memory",
                context: "finalize",
                message: format!("chunk {} was never staged", result.index),
                retryable: false,
            })?;
            assembled.extend_from_slice(data);
        }
        *self.committed.lock().expect("committed lock poisoned") = Some(assembled);
        Ok(())
    }

    async fn abort(&self) -> Result<()> {
        self.staged.lock().expect("staged lock poisoned").clear();
        self.aborted.store(true, Ordering::SeqCst);
        Ok(())
    }
}
