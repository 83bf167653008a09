//! 稳定的 DTO 与 API 响应契约。

use serde::Serialize;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 指标快照响应。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub events_put: u64,
    pub events_rejected: u64,
    pub batches_read: u64,
    pub batches_confirmed: u64,
    pub records_confirmed: u64,
    pub records_skipped_corrupt: u64,
    pub data_files_created: u64,
    pub data_files_deleted: u64,
    pub raw_events: u64,
    pub dropped_invalid: u64,
    pub uplink_send_success: u64,
    pub uplink_send_failure: u64,
    pub uplink_latency_ms_total: u64,
    pub uplink_latency_ms_count: u64,
}

/// 事件存储状态响应。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatusDto {
    /// `memory` 或 `file`。
    pub kind: String,
    pub stopped: bool,
    /// 尚未确认的记录数（文件存储为估算值）。
    pub pending_records: u64,
    /// 当前磁盘上的数据文件（内存存储为空）。
    pub data_files: Vec<String>,
}
