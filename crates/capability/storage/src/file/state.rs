//! 读取指针与状态文件
//!
//! 状态文件内容：`{"file": "<数据文件名>", "position": <行号>}`。
//! 每次提交整体重写：先写临时文件并 fsync，再 rename 覆盖，最后 fsync 目录，
//! 崩溃后不会读到写了一半的状态文件。

use crate::error::StorageError;
use crate::file::registry::STATE_FILE_NAME;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// 下一条待读取记录的位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPointer {
    pub file: String,
    #[serde(rename = "position")]
    pub line: u64,
}

impl ReaderPointer {
    pub fn new(file: impl Into<String>, line: u64) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// 指向文件开头
    pub fn start_of(file: impl Into<String>) -> Self {
        Self::new(file, 0)
    }
}

/// 读取状态文件；不存在时返回 `None`，内容损坏时返回错误
pub(crate) fn load_state(folder: &Path) -> Result<Option<ReaderPointer>, StorageError> {
    let content = match fs::read(folder.join(STATE_FILE_NAME)) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&content)?))
}

/// 原子提交读取指针
pub(crate) fn store_state(folder: &Path, pointer: &ReaderPointer) -> Result<(), StorageError> {
    let content = serde_json::to_vec(pointer)?;
    let tmp_path = folder.join(format!("{STATE_FILE_NAME}.tmp"));
    {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(&content)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, folder.join(STATE_FILE_NAME))?;
    fsync_dir(folder)?;
    Ok(())
}

/// fsync 目录，保证文件创建、rename、删除后的目录项落盘
#[cfg(unix)]
pub(crate) fn fsync_dir(folder: &Path) -> io::Result<()> {
    File::open(folder)?.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn fsync_dir(_folder: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_with_position_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pointer = ReaderPointer::new("data_1700000000000.txt", 42);
        store_state(dir.path(), &pointer).expect("store");

        let raw: serde_json::Value = serde_json::from_slice(
            &fs::read(dir.path().join(STATE_FILE_NAME)).expect("read"),
        )
        .expect("json");
        assert_eq!(raw["file"], "data_1700000000000.txt");
        assert_eq!(raw["position"], 42);
        assert!(!dir.path().join("state_file.json.tmp").exists());

        assert_eq!(load_state(dir.path()).expect("load"), Some(pointer));
    }

    #[test]
    fn absent_state_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_state(dir.path()).expect("load"), None);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(STATE_FILE_NAME), b"{\"file\": ").expect("write");
        assert!(matches!(
            load_state(dir.path()),
            Err(StorageError::State(_))
        ));
    }
}
