//! 边缘网关进程：设备接入 → 事件存储 → 云端上行，附带状态接口。

mod handlers;
mod routes;
mod wiring;

use gw_config::AppConfig;
use gw_storage::{EventStorage, EventStorageBackend};
use gw_telemetry::init_tracing;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<EventStorageBackend>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 文件存储的启动恢复涉及磁盘扫描，放到阻塞线程
    let settings = wiring::storage_settings(&config.storage);
    let storage = Arc::new(
        tokio::task::spawn_blocking(move || gw_storage::build_event_storage(settings)).await??,
    );
    info!(
        target: "gw.gateway",
        storage = storage.kind().as_str(),
        pending_records = storage.len(),
        "event_storage_ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest = config
        .ingest_enabled
        .then(|| wiring::spawn_ingest(&config, storage.clone(), shutdown_rx.clone()));
    let uplink = wiring::spawn_uplink(&config, storage.clone(), shutdown_rx);

    let app = routes::create_router(AppState {
        storage: storage.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "gw.gateway", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 先停止消费与接入，再关闭存储
    info!(target: "gw.gateway", "gateway_shutting_down");
    let _ = shutdown_tx.send(true);
    uplink.shutdown().await;
    if let Some(ingest) = ingest {
        if let Err(err) = ingest.await {
            error!(target: "gw.gateway", error = %err, "ingest_task_join_failed");
        }
    }
    let stopping = storage.clone();
    tokio::task::spawn_blocking(move || stopping.stop()).await?;
    info!(target: "gw.gateway", "gateway_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "gw.gateway", error = %err, "ctrl_c_listener_failed");
    }
}
