//! 事件存储能力接口
//!
//! 所有连接器（生产者）并发调用 `put`，唯一的上行分发器（消费者）循环调用
//! `get_event_pack` → 上传 → `event_pack_processing_done`。

use domain::StorageRecord;

/// 存储后端类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    File,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::File => "file",
        }
    }
}

/// 存储状态快照（用于状态接口）。
#[derive(Debug, Clone)]
pub struct StorageStatus {
    pub kind: StorageKind,
    pub stopped: bool,
    /// 尚未确认的记录数；文件存储按行数估算（包含损坏行）。
    pub pending_records: usize,
    pub data_files: Vec<String>,
}

/// 事件存储接口
///
/// 约定：
/// - `put` 从不 panic、从不无限阻塞；失败时记录日志并返回 `false`
/// - `get_event_pack` 在上一批未确认前总是返回同一批
/// - `event_pack_processing_done` 在没有未确认批次时为空操作
/// - `stop` 是单向终态，之后 `put` 一律失败
pub trait EventStorage: Send + Sync {
    /// 写入一条记录
    fn put(&self, record: StorageRecord) -> bool;

    /// 获取下一批未投递的记录（无数据时返回空列表，不阻塞）
    fn get_event_pack(&self) -> Vec<StorageRecord>;

    /// 确认上一批已被下游接收
    fn event_pack_processing_done(&self);

    /// 停止存储
    fn stop(&self);

    fn is_stopped(&self) -> bool;

    /// 尚未确认的记录数（近似值）
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn status(&self) -> StorageStatus;
}
