//! 日志初始化与网关计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
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

/// 进程级计数指标。
pub struct TelemetryMetrics {
    events_put: AtomicU64,
    events_rejected: AtomicU64,
    batches_read: AtomicU64,
    batches_confirmed: AtomicU64,
    records_confirmed: AtomicU64,
    records_skipped_corrupt: AtomicU64,
    data_files_created: AtomicU64,
    data_files_deleted: AtomicU64,
    raw_events: AtomicU64,
    dropped_invalid: AtomicU64,
    uplink_send_success: AtomicU64,
    uplink_send_failure: AtomicU64,
    uplink_latency_ms_total: AtomicU64,
    uplink_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            events_put: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            batches_read: AtomicU64::new(0),
            batches_confirmed: AtomicU64::new(0),
            records_confirmed: AtomicU64::new(0),
            records_skipped_corrupt: AtomicU64::new(0),
            data_files_created: AtomicU64::new(0),
            data_files_deleted: AtomicU64::new(0),
            raw_events: AtomicU64::new(0),
            dropped_invalid: AtomicU64::new(0),
            uplink_send_success: AtomicU64::new(0),
            uplink_send_failure: AtomicU64::new(0),
            uplink_latency_ms_total: AtomicU64::new(0),
            uplink_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_put: self.events_put.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            batches_read: self.batches_read.load(Ordering::Relaxed),
            batches_confirmed: self.batches_confirmed.load(Ordering::Relaxed),
            records_confirmed: self.records_confirmed.load(Ordering::Relaxed),
            records_skipped_corrupt: self.records_skipped_corrupt.load(Ordering::Relaxed),
            data_files_created: self.data_files_created.load(Ordering::Relaxed),
            data_files_deleted: self.data_files_deleted.load(Ordering::Relaxed),
            raw_events: self.raw_events.load(Ordering::Relaxed),
            dropped_invalid: self.dropped_invalid.load(Ordering::Relaxed),
            uplink_send_success: self.uplink_send_success.load(Ordering::Relaxed),
            uplink_send_failure: self.uplink_send_failure.load(Ordering::Relaxed),
            uplink_latency_ms_total: self.uplink_latency_ms_total.load(Ordering::Relaxed),
            uplink_latency_ms_count: self.uplink_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成上行批次 ID（仅用于日志关联）。
pub fn new_batch_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录写入存储成功次数。
pub fn record_event_put() {
    metrics().events_put.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入存储被拒绝次数（已停止、队列满、文件数超限、IO 失败）。
pub fn record_event_rejected() {
    metrics().events_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录读取到非空批次的次数。
pub fn record_batch_read() {
    metrics().batches_read.fetch_add(1, Ordering::Relaxed);
}

/// 记录批次确认次数与确认的记录数。
pub fn record_batch_confirmed(records: u64) {
    let metrics = metrics();
    metrics.batches_confirmed.fetch_add(1, Ordering::Relaxed);
    metrics
        .records_confirmed
        .fetch_add(records, Ordering::Relaxed);
}

/// 记录跳过的损坏行。
pub fn record_corrupt_record_skipped() {
    metrics()
        .records_skipped_corrupt
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_data_file_created() {
    metrics().data_files_created.fetch_add(1, Ordering::Relaxed);
}

pub fn record_data_file_deleted() {
    metrics().data_files_deleted.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接器收到的原始报文次数。
pub fn record_raw_event() {
    metrics().raw_events.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法转换而丢弃的报文次数。
pub fn record_dropped_invalid() {
    metrics().dropped_invalid.fetch_add(1, Ordering::Relaxed);
}

/// 记录上行发送成功次数与耗时（毫秒）。
pub fn record_uplink_success(latency_ms: u64) {
    let metrics = metrics();
    metrics.uplink_send_success.fetch_add(1, Ordering::Relaxed);
    metrics
        .uplink_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .uplink_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录上行发送失败次数。
pub fn record_uplink_failure() {
    metrics().uplink_send_failure.fetch_add(1, Ordering::Relaxed);
}
