//! 数据文件清单
//!
//! 维护目录中按创建顺序排列的数据文件及其“已读完”标记。
//! 写入端（多个连接器线程经由 writer）与读取端（唯一消费者）共享同一份清单，
//! 所有变更在内部互斥锁中完成。

use crate::error::StorageError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DATA_FILE_PREFIX: &str = "data_";
pub const DATA_FILE_SUFFIX: &str = ".txt";
pub const STATE_FILE_NAME: &str = "state_file.json";

/// 根据时间戳令牌生成数据文件名
pub fn data_file_name(token: u64) -> String {
    format!("{DATA_FILE_PREFIX}{token}{DATA_FILE_SUFFIX}")
}

/// 从数据文件名中解析时间戳令牌
pub fn parse_data_file_token(name: &str) -> Option<u64> {
    name.strip_prefix(DATA_FILE_PREFIX)?
        .strip_suffix(DATA_FILE_SUFFIX)?
        .parse()
        .ok()
}

#[derive(Debug, Clone)]
struct DataFile {
    name: String,
    token: u64,
    /// 读取端已完整遍历过该文件（仅本进程生命周期内有效）
    processed: bool,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// 始终按 token 升序
    data_files: Vec<DataFile>,
}

/// 数据文件清单
#[derive(Debug)]
pub struct FileRegistry {
    folder: PathBuf,
    inner: Mutex<RegistryInner>,
}

impl FileRegistry {
    /// 空清单
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// 扫描目录，收集已有的数据文件和状态文件
    pub fn scan(folder: &Path) -> Result<Self, StorageError> {
        let registry = Self::new(folder);
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if parse_data_file_token(&name).is_some() {
                registry.add_data_file(&name);
            }
        }
        Ok(registry)
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.folder.join(name)
    }

    // 清单只包含纯内存状态，持锁线程 panic 不会留下半更新的数据，直接恢复使用
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 按创建顺序返回所有数据文件
    pub fn data_files(&self) -> Vec<String> {
        self.lock()
            .data_files
            .iter()
            .map(|file| file.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().data_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data_files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().data_files.iter().any(|file| file.name == name)
    }

    pub fn oldest(&self) -> Option<String> {
        self.lock().data_files.first().map(|file| file.name.clone())
    }

    pub fn newest(&self) -> Option<String> {
        self.lock().data_files.last().map(|file| file.name.clone())
    }

    pub fn newest_token(&self) -> Option<u64> {
        self.lock().data_files.last().map(|file| file.token)
    }

    /// 紧随 `name` 之后的数据文件
    pub fn next_after(&self, name: &str) -> Option<String> {
        let token = parse_data_file_token(name)?;
        self.lock()
            .data_files
            .iter()
            .find(|file| file.token > token)
            .map(|file| file.name.clone())
    }

    /// 严格早于 `name` 的数据文件
    pub fn files_before(&self, name: &str) -> Vec<String> {
        let Some(token) = parse_data_file_token(name) else {
            return Vec::new();
        };
        self.lock()
            .data_files
            .iter()
            .take_while(|file| file.token < token)
            .map(|file| file.name.clone())
            .collect()
    }

    /// 登记数据文件；文件名非法或已存在时返回 `false`
    pub fn add_data_file(&self, name: &str) -> bool {
        let Some(token) = parse_data_file_token(name) else {
            return false;
        };
        let mut inner = self.lock();
        if inner.data_files.iter().any(|file| file.name == name) {
            return false;
        }
        let index = inner
            .data_files
            .partition_point(|file| (file.token, file.name.as_str()) < (token, name));
        inner.data_files.insert(
            index,
            DataFile {
                name: name.to_string(),
                token,
                processed: false,
            },
        );
        true
    }

    pub fn remove_data_file(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.data_files.len();
        inner.data_files.retain(|file| file.name != name);
        inner.data_files.len() != before
    }

    /// 标记读取端已完整遍历该文件
    pub fn confirm_file_processed(&self, name: &str) -> bool {
        let mut inner = self.lock();
        match inner.data_files.iter_mut().find(|file| file.name == name) {
            Some(file) => {
                file.processed = true;
                true
            }
            None => false,
        }
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.lock()
            .data_files
            .iter()
            .any(|file| file.name == name && file.processed)
    }
}
