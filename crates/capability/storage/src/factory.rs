//! 存储后端工厂
//!
//! 启动时根据配置一次性选择后端。

use crate::error::StorageError;
use crate::file::FileEventStorage;
use crate::memory::MemoryEventStorage;
use crate::settings::{DEFAULT_NO_RECORDS_SLEEP_INTERVAL_MS, StorageSettings};
use crate::traits::{EventStorage, StorageKind, StorageStatus};
use domain::StorageRecord;
use std::time::Duration;

/// 存储后端
pub enum EventStorageBackend {
    Memory(MemoryEventStorage),
    File(FileEventStorage),
}

impl EventStorageBackend {
    pub fn kind(&self) -> StorageKind {
        match self {
            EventStorageBackend::Memory(_) => StorageKind::Memory,
            EventStorageBackend::File(_) => StorageKind::File,
        }
    }

    /// 无数据时消费者的空闲等待
    pub fn no_records_sleep_interval(&self) -> Duration {
        match self {
            EventStorageBackend::Memory(_) => {
                Duration::from_millis(DEFAULT_NO_RECORDS_SLEEP_INTERVAL_MS)
            }
            EventStorageBackend::File(storage) => storage.no_records_sleep_interval(),
        }
    }

    fn inner(&self) -> &dyn EventStorage {
        match self {
            EventStorageBackend::Memory(storage) => storage,
            EventStorageBackend::File(storage) => storage,
        }
    }
}

impl EventStorage for EventStorageBackend {
    fn put(&self, record: StorageRecord) -> bool {
        self.inner().put(record)
    }

    fn get_event_pack(&self) -> Vec<StorageRecord> {
        self.inner().get_event_pack()
    }

    fn event_pack_processing_done(&self) {
        self.inner().event_pack_processing_done()
    }

    fn stop(&self) {
        self.inner().stop()
    }

    fn is_stopped(&self) -> bool {
        self.inner().is_stopped()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn status(&self) -> StorageStatus {
        self.inner().status()
    }
}

/// 按配置构建存储后端
pub fn build_event_storage(settings: StorageSettings) -> Result<EventStorageBackend, StorageError> {
    match settings {
        StorageSettings::Memory(settings) => {
            Ok(EventStorageBackend::Memory(MemoryEventStorage::new(settings)))
        }
        StorageSettings::File(settings) => {
            FileEventStorage::open(settings).map(EventStorageBackend::File)
        }
    }
}
