//! # 网关事件存储
//!
//! 位于所有协议连接器（生产者）与唯一的上行分发器（消费者）之间，
//! 保证已转换的消息至少投递一次：进程重启、网络中断、云端背压都不丢数据。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`EventStorage` 能力接口
//! 2. **配置层** (`settings.rs`)：内存 / 文件后端配置，兼容网关配置文件字段名
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **实现层**：
//!    - `memory`：有界内存队列，进程退出即丢失
//!    - `file/`：持久化文件队列（清单、写入端、读取端、状态文件）
//! 5. **工厂** (`factory.rs`)：启动时按配置选择后端
//!
//! ## 投递协议
//!
//! ```text
//! loop {
//!     let pack = storage.get_event_pack();     // 空 => 休眠 no_records_sleep_interval
//!     upload(&pack)?;                          // 失败 => 稍后重试，拿到同一批
//!     storage.event_pack_processing_done();    // 提交读取位置并回收已读文件
//! }
//! ```
//!
//! ## 磁盘布局（文件后端）
//!
//! - `data_<毫秒时间戳>.txt`：每行一条 base64 编码的记录
//! - `state_file.json`：`{"file": "<数据文件>", "position": <行号>}`
//!
//! ## 持久化窗口
//!
//! 唯一可能丢数据的窗口是最近写入但尚未 fsync 的记录，
//! 最多 `maxRecordsBetweenFsync` 条。fsync 之后的数据在读取端确认前一直保留。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use gw_storage::{EventStorage, FileStorageSettings, StorageSettings, build_event_storage};
//!
//! let storage = build_event_storage(StorageSettings::File(
//!     FileStorageSettings::with_folder("./data/"),
//! ))?;
//! storage.put("{\"deviceName\":\"meter-1\"}".into());
//! let pack = storage.get_event_pack();
//! storage.event_pack_processing_done();
//! ```

pub mod error;
pub mod factory;
pub mod file;
pub mod memory;
pub mod settings;
pub mod traits;

pub use error::*;
pub use factory::{EventStorageBackend, build_event_storage};
pub use file::{
    DATA_FILE_PREFIX, DATA_FILE_SUFFIX, FileEventStorage, FileRegistry, ReaderPointer,
    STATE_FILE_NAME, StorageReader, StorageWriter,
};
pub use memory::MemoryEventStorage;
pub use settings::*;
pub use traits::*;
