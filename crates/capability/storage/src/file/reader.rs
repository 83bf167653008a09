//! 数据文件读取端
//!
//! 维护两个指针：
//! - `current`：已提交（写入状态文件）的位置
//! - `pending`：本批扫描推进到的位置，调用 [`StorageReader::discard_batch`] 后才提交
//!
//! 一批可以跨越多个数据文件。损坏行记录告警后跳过，指针照常前进。
//! 空行解码为空记录。

use crate::error::StorageError;
use crate::file::codec::decode_line;
use crate::file::registry::FileRegistry;
use crate::file::state::{ReaderPointer, load_state, store_state};
use crate::settings::FileStorageSettings;
use domain::StorageRecord;
use gw_telemetry::{
    record_batch_confirmed, record_batch_read, record_corrupt_record_skipped,
    record_data_file_deleted,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 读取中的数据文件（打开时已跳到 `pending.line`）
struct OpenSegment {
    name: String,
    reader: BufReader<File>,
}

enum NextLine {
    Line(Vec<u8>),
    /// 当前没有完整的新行
    End,
    /// 数据文件在磁盘上已不存在
    Missing,
}

/// 数据文件读取端（仅由唯一的消费者使用）
pub struct StorageReader {
    settings: Arc<FileStorageSettings>,
    files: Arc<FileRegistry>,
    current: ReaderPointer,
    pending: ReaderPointer,
    pack: Option<Vec<StorageRecord>>,
    segment: Option<OpenSegment>,
}

impl StorageReader {
    /// 从状态文件恢复读取位置，并回收早于该位置的数据文件
    ///
    /// 状态文件缺失、损坏或指向不存在的文件时，回退到最早数据文件的开头
    /// （可能重复投递，不会丢失）。
    pub fn new(
        settings: Arc<FileStorageSettings>,
        files: Arc<FileRegistry>,
    ) -> Result<Self, StorageError> {
        let oldest = files
            .oldest()
            .ok_or_else(|| StorageError::NoDataFiles(files.folder().to_path_buf()))?;
        let recovered = match load_state(files.folder()) {
            Ok(Some(pointer)) if files.contains(&pointer.file) => Some(pointer),
            Ok(Some(pointer)) => {
                warn!(target: "gw.storage", file = %pointer.file, "state_file_points_to_missing_file");
                None
            }
            Ok(None) => {
                info!(target: "gw.storage", "state_file_absent");
                None
            }
            Err(err) => {
                warn!(target: "gw.storage", error = %err, "state_file_corrupt");
                None
            }
        };
        let needs_store = recovered.is_none();
        let pointer = recovered.unwrap_or_else(|| ReaderPointer::start_of(oldest));
        if needs_store {
            store_state(files.folder(), &pointer)?;
        }

        let mut reader = Self {
            settings,
            files,
            current: pointer.clone(),
            pending: pointer,
            pack: None,
            segment: None,
        };
        let reclaimed = reader.reclaim_files()?;
        info!(
            target: "gw.storage",
            file = %reader.current.file,
            position = reader.current.line,
            reclaimed,
            "reader_recovered"
        );
        Ok(reader)
    }

    /// 已提交的位置
    pub fn current_position(&self) -> &ReaderPointer {
        &self.current
    }

    /// 读取下一批；上一批未确认时原样返回上一批
    pub fn read(&mut self) -> Result<Vec<StorageRecord>, StorageError> {
        if let Some(pack) = &self.pack {
            return Ok(pack.clone());
        }

        let limit = self.settings.max_read_records_count;
        let mut records = Vec::new();
        // 发现后继文件后再读一次当前文件，兜住轮转前最后一次追加
        let mut drained_after_rotation = false;

        while records.len() < limit {
            match self.next_line()? {
                NextLine::Line(line) => {
                    drained_after_rotation = false;
                    self.pending.line += 1;
                    match decode_line(&line) {
                        Ok(record) => records.push(record),
                        Err(err) => {
                            record_corrupt_record_skipped();
                            warn!(
                                target: "gw.storage",
                                file = %self.pending.file,
                                position = self.pending.line - 1,
                                error = %err,
                                "corrupt_record_skipped"
                            );
                        }
                    }
                }
                NextLine::End => {
                    let Some(next) = self.files.next_after(&self.pending.file) else {
                        break;
                    };
                    if !drained_after_rotation {
                        drained_after_rotation = true;
                        continue;
                    }
                    self.files.confirm_file_processed(&self.pending.file);
                    self.advance_to(next);
                    drained_after_rotation = false;
                }
                NextLine::Missing => {
                    let Some(next) = self.files.next_after(&self.pending.file) else {
                        break;
                    };
                    warn!(target: "gw.storage", file = %self.pending.file, "data_file_missing");
                    self.files.remove_data_file(&self.pending.file);
                    self.advance_to(next);
                }
            }
        }

        if !records.is_empty() {
            record_batch_read();
            debug!(
                target: "gw.storage",
                records = records.len(),
                file = %self.pending.file,
                position = self.pending.line,
                "event_pack_read"
            );
            self.pack = Some(records.clone());
        }
        Ok(records)
    }

    /// 确认当前批次：提交 `pending`，然后删除早于提交位置的数据文件
    ///
    /// 没有未确认批次且指针未移动时为空操作。提交失败时批次保留，
    /// 下次 [`read`](Self::read) 仍返回同一批。
    pub fn discard_batch(&mut self) -> Result<(), StorageError> {
        if self.pack.is_none() && self.pending == self.current {
            return Ok(());
        }
        store_state(self.files.folder(), &self.pending)?;
        self.current = self.pending.clone();
        if let Some(pack) = self.pack.take() {
            record_batch_confirmed(pack.len() as u64);
            debug!(
                target: "gw.storage",
                records = pack.len(),
                file = %self.current.file,
                position = self.current.line,
                "event_pack_confirmed"
            );
        }
        self.reclaim_files()?;
        Ok(())
    }

    /// 关闭打开的数据文件
    pub fn close(&mut self) {
        self.segment = None;
    }

    fn advance_to(&mut self, next: String) {
        self.segment = None;
        self.pending = ReaderPointer::start_of(next);
    }

    /// 删除严格早于已提交位置所在文件的数据文件
    fn reclaim_files(&mut self) -> Result<usize, StorageError> {
        let stale = self.files.files_before(&self.current.file);
        for name in &stale {
            match std::fs::remove_file(self.files.path_of(name)) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            self.files.remove_data_file(name);
            record_data_file_deleted();
            info!(target: "gw.storage", file = %name, "data_file_deleted");
        }
        Ok(stale.len())
    }

    fn next_line(&mut self) -> Result<NextLine, StorageError> {
        if !self.open_segment()? {
            return Ok(NextLine::Missing);
        }
        let Some(segment) = self.segment.as_mut() else {
            return Ok(NextLine::End);
        };
        Ok(match read_complete_line(&mut segment.reader)? {
            Some(line) => NextLine::Line(line),
            None => NextLine::End,
        })
    }

    /// 确保 `pending.file` 已打开并定位到 `pending.line`；文件不存在时返回 `false`
    fn open_segment(&mut self) -> Result<bool, StorageError> {
        if self
            .segment
            .as_ref()
            .is_some_and(|segment| segment.name == self.pending.file)
        {
            return Ok(true);
        }
        self.segment = None;
        // 本进程内已完整遍历过的文件不再重新打开
        while self.files.is_processed(&self.pending.file) {
            let Some(next) = self.files.next_after(&self.pending.file) else {
                break;
            };
            debug!(target: "gw.storage", file = %self.pending.file, next = %next, "processed_file_skipped");
            self.advance_to(next);
        }
        let file = match File::open(self.files.path_of(&self.pending.file)) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        let mut reader = BufReader::new(file);
        let mut skipped = 0;
        while skipped < self.pending.line {
            if read_complete_line(&mut reader)?.is_none() {
                break;
            }
            skipped += 1;
        }
        if skipped < self.pending.line {
            warn!(
                target: "gw.storage",
                file = %self.pending.file,
                position = self.pending.line,
                lines = skipped,
                "position_beyond_end_of_file"
            );
            self.pending.line = skipped;
        }
        self.segment = Some(OpenSegment {
            name: self.pending.file.clone(),
            reader,
        });
        Ok(true)
    }
}

/// 读取一整行；遇到尚未写完的尾行时回退，留到下次再读
fn read_complete_line(reader: &mut BufReader<File>) -> Result<Option<Vec<u8>>, StorageError> {
    let mut buf = Vec::new();
    let read = reader.read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') {
        reader.seek_relative(-(read as i64))?;
        return Ok(None);
    }
    Ok(Some(buf))
}
