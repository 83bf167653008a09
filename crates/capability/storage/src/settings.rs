//! 存储配置
//!
//! 字段名与网关配置文件保持一致（camelCase），可直接从 JSON 反序列化：
//!
//! ```json
//! { "type": "file", "dataFolderPath": "./data/", "maxFilesCount": 10,
//!   "maxRecordsPerFile": 10000, "maxReadRecordsCount": 100,
//!   "maxRecordsBetweenFsync": 1, "noRecordsSleepIntervalMs": 1000 }
//! ```
//!
//! `maxRecordsBetweenFsync` 决定持久化窗口：进程崩溃最多丢失最近写入且尚未
//! fsync 的这么多条记录。设为 1 表示每条记录写入后立即 fsync。

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 数据文件数量上限的最小值。
pub const MIN_FILES_COUNT: usize = 2;

/// 内存存储默认空闲等待。
pub const DEFAULT_NO_RECORDS_SLEEP_INTERVAL_MS: u64 = 1000;

/// 内存存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStorageSettings {
    /// 队列容量
    #[serde(default = "default_max_records_count")]
    pub max_records_count: usize,
    /// 单批最大记录数
    #[serde(default = "default_read_records_count")]
    pub read_records_count: usize,
}

impl Default for MemoryStorageSettings {
    fn default() -> Self {
        Self {
            max_records_count: default_max_records_count(),
            read_records_count: default_read_records_count(),
        }
    }
}

impl MemoryStorageSettings {
    pub fn sanitized(mut self) -> Self {
        if self.max_records_count == 0 {
            self.max_records_count = 1;
        }
        if self.read_records_count == 0 {
            self.read_records_count = 1;
        }
        self
    }
}

/// 文件存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStorageSettings {
    /// 数据目录
    #[serde(default = "default_data_folder_path")]
    pub data_folder_path: PathBuf,
    /// 单个数据文件最大记录数
    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,
    /// 单批最大记录数
    #[serde(default = "default_max_read_records_count")]
    pub max_read_records_count: usize,
    /// 两次 fsync 之间最多写入的记录数
    #[serde(default = "default_max_records_between_fsync")]
    pub max_records_between_fsync: usize,
    /// 数据文件数量上限（不小于 [`MIN_FILES_COUNT`]）
    #[serde(default = "default_max_files_count", alias = "maxFileCount")]
    pub max_files_count: usize,
    /// 无数据时消费者的空闲等待（毫秒）
    #[serde(default = "default_no_records_sleep_interval_ms")]
    pub no_records_sleep_interval_ms: u64,
}

impl Default for FileStorageSettings {
    fn default() -> Self {
        Self {
            data_folder_path: default_data_folder_path(),
            max_records_per_file: default_max_records_per_file(),
            max_read_records_count: default_max_read_records_count(),
            max_records_between_fsync: default_max_records_between_fsync(),
            max_files_count: default_max_files_count(),
            no_records_sleep_interval_ms: default_no_records_sleep_interval_ms(),
        }
    }
}

impl FileStorageSettings {
    /// 使用默认参数并指定数据目录
    pub fn with_folder(data_folder_path: impl Into<PathBuf>) -> Self {
        Self {
            data_folder_path: data_folder_path.into(),
            ..Self::default()
        }
    }

    pub fn sanitized(mut self) -> Self {
        if self.max_records_per_file == 0 {
            self.max_records_per_file = 1;
        }
        if self.max_read_records_count == 0 {
            self.max_read_records_count = 1;
        }
        if self.max_records_between_fsync == 0 {
            self.max_records_between_fsync = 1;
        }
        // 正在读的文件在读取端越过它之前不会被回收，至少还需要一个文件用于轮转
        if self.max_files_count < MIN_FILES_COUNT {
            self.max_files_count = MIN_FILES_COUNT;
        }
        self
    }

    pub fn no_records_sleep_interval(&self) -> Duration {
        Duration::from_millis(self.no_records_sleep_interval_ms)
    }
}

/// 存储后端选择（按 `type` 字段区分）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageSettings {
    Memory(MemoryStorageSettings),
    File(FileStorageSettings),
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings::Memory(MemoryStorageSettings::default())
    }
}

impl StorageSettings {
    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        serde_json::from_str(json).map_err(|err| StorageError::InvalidSettings(err.to_string()))
    }
}

fn default_max_records_count() -> usize {
    100_000
}

fn default_read_records_count() -> usize {
    100
}

fn default_data_folder_path() -> PathBuf {
    PathBuf::from("./data/")
}

fn default_max_records_per_file() -> usize {
    10_000
}

fn default_max_read_records_count() -> usize {
    100
}

fn default_max_records_between_fsync() -> usize {
    1
}

fn default_max_files_count() -> usize {
    10
}

fn default_no_records_sleep_interval_ms() -> u64 {
    DEFAULT_NO_RECORDS_SLEEP_INTERVAL_MS
}
