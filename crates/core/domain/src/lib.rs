//! 网关共享模型：所有能力模块共用的记录与消息结构。

pub mod data;

pub use data::{ConvertedData, RawEvent, StorageRecord, TelemetryEntry};
