//! 存储层错误类型
//!
//! 引擎内部所有可失败步骤返回 `StorageError`，在 `EventStorage` 边界上
//! 统一记录日志并转换为 `false` / 空批次。

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 行写入、读取、删除等 IO 失败
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 无法创建新的数据文件（磁盘配额、权限等）
    #[error("cannot create data file {path:?}: {source}")]
    CannotCreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 数据文件数量达到上限
    #[error("data file count limit reached: {limit}")]
    FileCountExceeded { limit: usize },

    /// 内存队列已满
    #[error("memory queue is full: {capacity}")]
    QueueFull { capacity: usize },

    /// 记录行无法解码
    #[error("corrupt record: {0}")]
    Decode(String),

    /// 状态文件无法解析或序列化
    #[error("state file error: {0}")]
    State(#[from] serde_json::Error),

    /// 存储目录中没有可读的数据文件
    #[error("no data files in {0:?}")]
    NoDataFiles(PathBuf),

    /// 配置无效
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// 存储已停止
    #[error("storage stopped")]
    Stopped,

    /// 锁被污染（持锁线程 panic）
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}
