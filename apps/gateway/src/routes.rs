//! 状态接口路由
//!
//! - 健康检查：/health
//! - 指标快照：/metrics
//! - 事件存储状态：/storage

use super::AppState;
use super::handlers::{get_metrics, get_storage_status, health};
use axum::{Router, routing::get};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/storage", get(get_storage_status))
        .with_state(state)
}
