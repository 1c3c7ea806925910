//! Append-only event logs.
//!
//! A log is the single ordered source of truth shared by every session of a
//! board. Sessions never assume a transport: they append batches and read
//! everything past their cursor.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::Storage;
use crate::task::StoredEvent;

pub trait EventLog {
    /// Append a batch; the batch lands contiguously in log order.
    fn append(&mut self, batch: &[StoredEvent]) -> Result<()>;

    /// Every event at index `offset` or later.
    fn read_from(&self, offset: usize) -> Result<Vec<StoredEvent>>;

    fn read_all(&self) -> Result<Vec<StoredEvent>> {
        self.read_from(0)
    }
}

/// In-process log. Clones share the same underlying event list, so several
/// stores opened on clones behave like tabs on one board.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    events: Arc<Mutex<Vec<StoredEvent>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.guard()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.guard()?.is_empty())
    }

    fn guard(&self) -> Result<MutexGuard<'_, Vec<StoredEvent>>> {
        self.events
            .lock()
            .map_err(|_| Error::OperationFailed("event log mutex poisoned".to_string()))
    }
}

impl EventLog for MemoryLog {
    fn append(&mut self, batch: &[StoredEvent]) -> Result<()> {
        self.guard()?.extend_from_slice(batch);
        Ok(())
    }

    fn read_from(&self, offset: usize) -> Result<Vec<StoredEvent>> {
        let events = self.guard()?;
        Ok(events.iter().skip(offset).cloned().collect())
    }
}

/// Log backed by `.kanban/events.jsonl`, shared across processes.
#[derive(Debug, Clone)]
pub struct JsonlLog {
    storage: Storage,
}

impl JsonlLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl EventLog for JsonlLog {
    fn append(&mut self, batch: &[StoredEvent]) -> Result<()> {
        let path = self.storage.events_file();
        let _lock = FileLock::acquire(self.storage.lock_file(&path), DEFAULT_LOCK_TIMEOUT_MS)?;
        self.storage.append_jsonl(&path, batch)
    }

    fn read_from(&self, offset: usize) -> Result<Vec<StoredEvent>> {
        let events: Vec<StoredEvent> = self.storage.read_jsonl(&self.storage.events_file())?;
        Ok(events.into_iter().skip(offset).collect())
    }
}
