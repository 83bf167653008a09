//! 数据文件写入端
//!
//! 每条记录编码为一行，以一次 `write_all` 追加到当前数据文件，写入后读取端
//! 立即可见；每 `max_records_between_fsync` 条执行一次 `sync_data`。
//! 当前文件已满（行数达到 `max_records_per_file`）时，先 fsync 并关闭旧文件，
//! 再创建并登记新文件，因此清单中出现新文件时旧文件不会再有任何追加。

use crate::error::StorageError;
use crate::file::codec::encode_line;
use crate::file::registry::{FileRegistry, data_file_name};
use crate::file::state::fsync_dir;
use crate::settings::FileStorageSettings;
use domain::StorageRecord;
use gw_telemetry::record_data_file_created;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 当前写入目标的打开句柄，随轮转关闭（Drop 即关闭）
struct OpenDataFile {
    name: String,
    file: File,
}

/// 数据文件写入端
pub struct StorageWriter {
    settings: Arc<FileStorageSettings>,
    files: Arc<FileRegistry>,
    current_file: String,
    current_records: usize,
    handle: Option<OpenDataFile>,
    writes_since_sync: usize,
    /// 上一次追加不完整（IO 失败或启动时发现残缺尾行），下次写入前先补换行
    broken_line: bool,
}

impl StorageWriter {
    /// 在清单中最新的数据文件上继续追加；清单为空时创建新文件
    pub fn new(
        settings: Arc<FileStorageSettings>,
        files: Arc<FileRegistry>,
    ) -> Result<Self, StorageError> {
        let current_file = match files.newest() {
            Some(name) => name,
            None => create_data_file(&files)?,
        };
        let tail = scan_tail(&files.path_of(&current_file))?;
        if !tail.terminated {
            warn!(target: "gw.storage", file = %current_file, "data_file_has_partial_tail");
        }
        info!(
            target: "gw.storage",
            file = %current_file,
            records = tail.lines,
            "writer_resumed"
        );
        Ok(Self {
            settings,
            files,
            current_file,
            current_records: tail.lines,
            handle: None,
            writes_since_sync: 0,
            broken_line: !tail.terminated,
        })
    }

    /// 当前写入目标
    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    /// 当前文件中已写入的行数
    pub fn current_records(&self) -> usize {
        self.current_records
    }

    /// 追加一条记录
    pub fn write(&mut self, record: &StorageRecord) -> Result<(), StorageError> {
        if self.current_records >= self.settings.max_records_per_file {
            self.rotate()?;
        }

        let mut line = Vec::with_capacity(record.len() * 4 / 3 + 6);
        if self.broken_line {
            line.push(b'\n');
        }
        line.extend_from_slice(&encode_line(record));

        let file = match self.handle() {
            Ok(file) => file,
            Err(err) => {
                self.handle = None;
                return Err(err.into());
            }
        };
        if let Err(err) = file.write_all(&line) {
            // 句柄可能已失效，下次写入时重新打开；只有尾部确实残缺才补换行
            self.handle = None;
            let path = self.files.path_of(&self.current_file);
            self.broken_line = !ends_with_newline(&path).unwrap_or(false);
            return Err(err.into());
        }
        self.broken_line = false;
        self.current_records += 1;
        self.writes_since_sync += 1;

        if self.writes_since_sync >= self.settings.max_records_between_fsync {
            self.sync()?;
        }
        Ok(())
    }

    /// fsync 当前文件
    pub fn sync(&mut self) -> Result<(), StorageError> {
        if let Some(open) = &self.handle {
            open.file.sync_data()?;
        }
        self.writes_since_sync = 0;
        Ok(())
    }

    /// fsync 并关闭当前句柄（下次写入时重新打开）
    pub fn close(&mut self) -> Result<(), StorageError> {
        self.sync()?;
        self.handle = None;
        Ok(())
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        let stale = self
            .handle
            .as_ref()
            .is_some_and(|open| open.name != self.current_file);
        if stale {
            self.handle = None;
        }
        if self.handle.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.files.path_of(&self.current_file))?;
            self.handle = Some(OpenDataFile {
                name: self.current_file.clone(),
                file,
            });
        }
        match self.handle.as_mut() {
            Some(open) => Ok(&mut open.file),
            None => Err(io::Error::other("data file handle unavailable")),
        }
    }

    fn rotate(&mut self) -> Result<(), StorageError> {
        let limit = self.settings.max_files_count;
        if self.files.len() >= limit {
            return Err(StorageError::FileCountExceeded { limit });
        }
        self.close()?;
        let next = create_data_file(&self.files)?;
        let previous = std::mem::replace(&mut self.current_file, next);
        self.current_records = 0;
        self.broken_line = false;
        info!(
            target: "gw.storage",
            previous = %previous,
            file = %self.current_file,
            "data_file_rotated"
        );
        Ok(())
    }
}

/// 创建并登记一个新的空数据文件
///
/// 文件名令牌取当前毫秒时间戳；若不大于已有最新令牌则取最新令牌 + 1，
/// 保证令牌严格递增。
pub(crate) fn create_data_file(files: &FileRegistry) -> Result<String, StorageError> {
    let mut token = now_epoch_ms();
    if let Some(newest) = files.newest_token() {
        if token <= newest {
            token = newest + 1;
        }
    }
    let name = data_file_name(token);
    let path = files.path_of(&name);
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|source| StorageError::CannotCreateFile {
            path: path.clone(),
            source,
        })?;
    fsync_dir(files.folder())?;
    files.add_data_file(&name);
    record_data_file_created();
    info!(target: "gw.storage", file = %name, "data_file_created");
    Ok(name)
}

struct Tail {
    lines: usize,
    terminated: bool,
}

/// 统计文件行数（含残缺尾行），并判断文件是否以换行结尾
fn scan_tail(path: &Path) -> Result<Tail, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Tail {
                lines: 0,
                terminated: true,
            });
        }
        Err(err) => return Err(err.into()),
    };
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut tail = Tail {
        lines: 0,
        terminated: true,
    };
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        tail.lines += 1;
        tail.terminated = buf.last() == Some(&b'\n');
    }
    Ok(tail)
}

/// 文件为空或以换行结尾
fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn now_epoch_ms() -> u64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as u64
}
