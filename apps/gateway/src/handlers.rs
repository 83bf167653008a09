use crate::AppState;
use api_contract::{ApiResponse, MetricsSnapshotDto, StorageStatusDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gw_storage::EventStorage;
use gw_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": !state.storage.is_stopped(),
        "storage": state.storage.kind().as_str(),
    }))
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            events_put: snapshot.events_put,
            events_rejected: snapshot.events_rejected,
            batches_read: snapshot.batches_read,
            batches_confirmed: snapshot.batches_confirmed,
            records_confirmed: snapshot.records_confirmed,
            records_skipped_corrupt: snapshot.records_skipped_corrupt,
            data_files_created: snapshot.data_files_created,
            data_files_deleted: snapshot.data_files_deleted,
            raw_events: snapshot.raw_events,
            dropped_invalid: snapshot.dropped_invalid,
            uplink_send_success: snapshot.uplink_send_success,
            uplink_send_failure: snapshot.uplink_send_failure,
            uplink_latency_ms_total: snapshot.uplink_latency_ms_total,
            uplink_latency_ms_count: snapshot.uplink_latency_ms_count,
        })),
    )
        .into_response()
}

pub async fn get_storage_status(State(state): State<AppState>) -> Response {
    // 文件存储的状态统计需要获取读写锁
    let storage = state.storage.clone();
    let status = match tokio::task::spawn_blocking(move || storage.status()).await {
        Ok(status) => status,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error("INTERNAL.ERROR", err.to_string())),
            )
                .into_response();
        }
    };
    (
        StatusCode::OK,
        Json(ApiResponse::success(StorageStatusDto {
            kind: status.kind.as_str().to_string(),
            stopped: status.stopped,
            pending_records: status.pending_records as u64,
            data_files: status.data_files,
        })),
    )
        .into_response()
}
