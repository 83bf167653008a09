//! 内存事件存储
//!
//! 有界 FIFO 队列，进程退出即丢失。队列满时 `put` 直接返回 `false`，
//! 由调用方决定丢弃还是告警（不做持久化，也不做拒绝之外的背压）。

use crate::error::StorageError;
use crate::settings::MemoryStorageSettings;
use crate::traits::{EventStorage, StorageKind, StorageStatus};
use domain::StorageRecord;
use gw_telemetry::{record_batch_confirmed, record_batch_read, record_event_put, record_event_rejected};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

struct MemoryState {
    queue: VecDeque<StorageRecord>,
    /// 已取出但尚未确认的批次
    pack: Option<Vec<StorageRecord>>,
}

/// 内存事件存储
pub struct MemoryEventStorage {
    settings: MemoryStorageSettings,
    state: Mutex<MemoryState>,
    stopped: AtomicBool,
}

impl MemoryEventStorage {
    pub fn new(settings: MemoryStorageSettings) -> Self {
        let settings = settings.sanitized();
        let initial_capacity = settings.max_records_count.min(1024);
        Self {
            settings,
            state: Mutex::new(MemoryState {
                queue: VecDeque::with_capacity(initial_capacity),
                pack: None,
            }),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &MemoryStorageSettings {
        &self.settings
    }

    /// 队列中等待读取的记录数（不含未确认批次）
    pub fn queued(&self) -> usize {
        self.lock().map(|state| state.queue.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::LockPoisoned("memory queue"))
    }

    fn try_put(&self, record: StorageRecord) -> Result<(), StorageError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(StorageError::Stopped);
        }
        let mut state = self.lock()?;
        if state.queue.len() >= self.settings.max_records_count {
            return Err(StorageError::QueueFull {
                capacity: self.settings.max_records_count,
            });
        }
        state.queue.push_back(record);
        Ok(())
    }

    fn try_get_event_pack(&self) -> Result<Vec<StorageRecord>, StorageError> {
        let mut state = self.lock()?;
        if let Some(pack) = &state.pack {
            return Ok(pack.clone());
        }
        let count = self.settings.read_records_count.min(state.queue.len());
        let pack: Vec<StorageRecord> = state.queue.drain(..count).collect();
        if !pack.is_empty() {
            state.pack = Some(pack.clone());
            record_batch_read();
        }
        Ok(pack)
    }
}

impl EventStorage for MemoryEventStorage {
    fn put(&self, record: StorageRecord) -> bool {
        match self.try_put(record) {
            Ok(()) => {
                record_event_put();
                true
            }
            Err(err) => {
                record_event_rejected();
                warn!(target: "gw.storage", error = %err, "memory_put_rejected");
                false
            }
        }
    }

    fn get_event_pack(&self) -> Vec<StorageRecord> {
        match self.try_get_event_pack() {
            Ok(pack) => pack,
            Err(err) => {
                error!(target: "gw.storage", error = %err, "memory_read_failed");
                Vec::new()
            }
        }
    }

    fn event_pack_processing_done(&self) {
        match self.lock() {
            Ok(mut state) => {
                if let Some(pack) = state.pack.take() {
                    record_batch_confirmed(pack.len() as u64);
                }
            }
            Err(err) => error!(target: "gw.storage", error = %err, "memory_confirm_failed"),
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn len(&self) -> usize {
        self.lock()
            .map(|state| state.queue.len() + state.pack.as_ref().map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn status(&self) -> StorageStatus {
        StorageStatus {
            kind: StorageKind::Memory,
            stopped: self.is_stopped(),
            pending_records: self.len(),
            data_files: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(max_records_count: usize, read_records_count: usize) -> MemoryEventStorage {
        MemoryEventStorage::new(MemoryStorageSettings {
            max_records_count,
            read_records_count,
        })
    }

    #[test]
    fn partial_batch_is_returned() {
        let storage = storage(10, 5);
        assert!(storage.put("a".into()));
        assert!(storage.put("b".into()));
        let pack = storage.get_event_pack();
        assert_eq!(pack, vec![StorageRecord::from("a"), StorageRecord::from("b")]);
    }

    #[test]
    fn unconfirmed_pack_is_returned_again() {
        let storage = storage(10, 2);
        for value in ["a", "b", "c"] {
            assert!(storage.put(value.into()));
        }
        let first = storage.get_event_pack();
        let second = storage.get_event_pack();
        assert_eq!(first, second);
        assert_eq!(storage.len(), 3);

        storage.event_pack_processing_done();
        assert_eq!(storage.get_event_pack(), vec![StorageRecord::from("c")]);
    }

    #[test]
    fn popped_pack_frees_queue_capacity() {
        let storage = storage(2, 2);
        assert!(storage.put("a".into()));
        assert!(storage.put("b".into()));
        assert!(!storage.put("c".into()));
        let _ = storage.get_event_pack();
        assert_eq!(storage.queued(), 0);
        assert!(storage.put("c".into()));
    }
}
