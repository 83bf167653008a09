//! 持久化文件事件存储
//!
//! 组合 [`FileRegistry`]、[`StorageWriter`]、[`StorageReader`]：
//!
//! ```text
//! connectors ──put()──▶ Mutex<StorageWriter> ──append──▶ data_<token>.txt ...
//!                                                           │
//! uplink ◀──get_event_pack()── Mutex<StorageReader> ◀──read─┘
//!        ──event_pack_processing_done()──▶ state_file.json + 回收已读文件
//! ```
//!
//! 写入端与读取端各自持有独立的互斥锁，互不嵌套；共享的文件清单有自己的锁。

mod codec;
pub mod reader;
pub mod registry;
pub mod state;
pub mod writer;

pub use reader::StorageReader;
pub use registry::{
    DATA_FILE_PREFIX, DATA_FILE_SUFFIX, FileRegistry, STATE_FILE_NAME,
    data_file_name, parse_data_file_token,
};
pub use state::ReaderPointer;
pub use writer::StorageWriter;

use crate::error::StorageError;
use crate::settings::FileStorageSettings;
use crate::traits::{EventStorage, StorageKind, StorageStatus};
use domain::StorageRecord;
use gw_telemetry::{record_event_put, record_event_rejected};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info, warn};

/// 持久化文件事件存储
pub struct FileEventStorage {
    settings: Arc<FileStorageSettings>,
    files: Arc<FileRegistry>,
    writer: Mutex<StorageWriter>,
    reader: Mutex<StorageReader>,
    stopped: AtomicBool,
}

impl FileEventStorage {
    /// 打开（或初始化）数据目录并完成启动恢复
    pub fn open(settings: FileStorageSettings) -> Result<Self, StorageError> {
        let settings = Arc::new(settings.sanitized());
        let folder = settings.data_folder_path.clone();
        fs::create_dir_all(&folder)?;

        let files = Arc::new(FileRegistry::scan(&folder)?);
        if files.is_empty() {
            writer::create_data_file(&files)?;
        }
        let writer = StorageWriter::new(settings.clone(), files.clone())?;
        let reader = StorageReader::new(settings.clone(), files.clone())?;

        info!(
            target: "gw.storage",
            folder = %folder.display(),
            data_files = files.len(),
            max_records_per_file = settings.max_records_per_file,
            max_read_records_count = settings.max_read_records_count,
            max_records_between_fsync = settings.max_records_between_fsync,
            max_files_count = settings.max_files_count,
            "file_storage_opened"
        );
        Ok(Self {
            settings,
            files,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &FileStorageSettings {
        &self.settings
    }

    /// 当前磁盘上的数据文件（按创建顺序）
    pub fn data_files(&self) -> Vec<String> {
        self.files.data_files()
    }

    /// 已提交的读取位置
    pub fn reader_position(&self) -> Option<ReaderPointer> {
        self.lock_reader()
            .ok()
            .map(|reader| reader.current_position().clone())
    }

    pub fn no_records_sleep_interval(&self) -> Duration {
        self.settings.no_records_sleep_interval()
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, StorageWriter>, StorageError> {
        self.writer
            .lock()
            .map_err(|_| StorageError::LockPoisoned("storage writer"))
    }

    fn lock_reader(&self) -> Result<MutexGuard<'_, StorageReader>, StorageError> {
        self.reader
            .lock()
            .map_err(|_| StorageError::LockPoisoned("storage reader"))
    }

    fn try_put(&self, record: &StorageRecord) -> Result<(), StorageError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(StorageError::Stopped);
        }
        self.lock_writer()?.write(record)
    }

    /// 估算未确认的行数：已提交位置之后的所有行
    fn pending_lines(&self) -> Result<usize, StorageError> {
        let (writer_file, writer_records) = {
            let writer = self.lock_writer()?;
            (writer.current_file().to_string(), writer.current_records())
        };
        let position = self.lock_reader()?.current_position().clone();
        let files = self.files.data_files();
        let Some(index) = files.iter().position(|name| *name == position.file) else {
            return Ok(0);
        };
        let line = usize::try_from(position.line).unwrap_or(usize::MAX);
        let per_file = self.settings.max_records_per_file;
        let mut pending = 0usize;
        for name in &files[index..] {
            let lines = if *name == writer_file {
                writer_records
            } else {
                per_file
            };
            let skip = if *name == position.file { line } else { 0 };
            pending = pending.saturating_add(lines.saturating_sub(skip));
        }
        Ok(pending)
    }
}

impl EventStorage for FileEventStorage {
    fn put(&self, record: StorageRecord) -> bool {
        match self.try_put(&record) {
            Ok(()) => {
                record_event_put();
                true
            }
            Err(StorageError::Stopped) => {
                record_event_rejected();
                warn!(target: "gw.storage", "file_storage_stopped");
                false
            }
            Err(err) => {
                record_event_rejected();
                error!(target: "gw.storage", error = %err, "file_put_failed");
                false
            }
        }
    }

    fn get_event_pack(&self) -> Vec<StorageRecord> {
        match self.lock_reader().and_then(|mut reader| reader.read()) {
            Ok(pack) => pack,
            Err(err) => {
                error!(target: "gw.storage", error = %err, "file_read_failed");
                Vec::new()
            }
        }
    }

    fn event_pack_processing_done(&self) {
        if let Err(err) = self
            .lock_reader()
            .and_then(|mut reader| reader.discard_batch())
        {
            error!(target: "gw.storage", error = %err, "file_confirm_failed");
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        if let Err(err) = self.lock_writer().and_then(|mut writer| writer.close()) {
            error!(target: "gw.storage", error = %err, "file_writer_close_failed");
        }
        if let Ok(mut reader) = self.lock_reader() {
            reader.close();
        }
        info!(target: "gw.storage", "file_storage_stopped");
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn len(&self) -> usize {
        self.pending_lines().unwrap_or(0)
    }

    fn status(&self) -> StorageStatus {
        StorageStatus {
            kind: StorageKind::File,
            stopped: self.is_stopped(),
            pending_records: self.len(),
            data_files: self.data_files(),
        }
    }
}
