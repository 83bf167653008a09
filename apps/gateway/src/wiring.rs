//! 配置到各能力模块的装配

use gw_config::{AppConfig, StorageConfig, StorageType};
use gw_ingest::{MqttSource, MqttSourceConfig, RawEventHandler, Source, StorageSink};
use gw_storage::{
    EventStorage, EventStorageBackend, FileStorageSettings, MemoryStorageSettings,
    StorageSettings,
};
use gw_uplink::{
    LoggingTransport, MqttUplink, MqttUplinkConfig, UplinkDispatcher, UplinkDispatcherConfig,
    UplinkTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 采集源断开后的重连间隔
const INGEST_RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub fn storage_settings(config: &StorageConfig) -> StorageSettings {
    match config.storage_type {
        StorageType::Memory => StorageSettings::Memory(MemoryStorageSettings {
            max_records_count: config.max_records_count,
            read_records_count: config.read_records_count,
        }),
        StorageType::File => StorageSettings::File(FileStorageSettings {
            data_folder_path: config.data_folder_path.clone(),
            max_records_per_file: config.max_records_per_file,
            max_read_records_count: config.max_read_records_count,
            max_records_between_fsync: config.max_records_between_fsync,
            max_files_count: config.max_files_count,
            no_records_sleep_interval_ms: config.no_records_sleep_interval_ms,
        }),
    }
}

pub fn spawn_ingest(
    config: &AppConfig,
    storage: Arc<EventStorageBackend>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let source = MqttSource::new(MqttSourceConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_prefix: config.mqtt_topic_prefix.clone(),
    });
    let storage: Arc<dyn EventStorage> = storage;
    let handler: Arc<dyn RawEventHandler> =
        Arc::new(StorageSink::new(storage, config.mqtt_topic_prefix.clone()));
    tokio::spawn(async move {
        info!(target: "gw.gateway", topic_prefix = %source.config().topic_prefix, "ingest_started");
        loop {
            tokio::select! {
                result = source.run(handler.clone()) => {
                    if let Err(err) = result {
                        warn!(target: "gw.gateway", error = %err, "ingest_source_failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(INGEST_RECONNECT_DELAY) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!(target: "gw.gateway", "ingest_stopped");
    })
}

/// 上行相关的后台任务
pub struct UplinkTasks {
    pub dispatcher: JoinHandle<()>,
    /// MQTT 事件循环，仅在启用云端上行时存在
    pub eventloop: Option<JoinHandle<()>>,
}

impl UplinkTasks {
    /// 等待分发循环退出后终止 MQTT 事件循环
    pub async fn shutdown(self) {
        if let Err(err) = self.dispatcher.await {
            error!(target: "gw.gateway", error = %err, "uplink_task_join_failed");
        }
        if let Some(eventloop) = self.eventloop {
            eventloop.abort();
            if let Err(err) = eventloop.await {
                if !err.is_cancelled() {
                    error!(target: "gw.gateway", error = %err, "uplink_eventloop_join_failed");
                }
            }
        }
    }
}

pub fn spawn_uplink(
    config: &AppConfig,
    storage: Arc<EventStorageBackend>,
    shutdown: watch::Receiver<bool>,
) -> UplinkTasks {
    let (transport, eventloop): (Arc<dyn UplinkTransport>, _) = if config.uplink.enabled {
        let (uplink, eventloop) = MqttUplink::connect(MqttUplinkConfig {
            host: config.uplink.host.clone(),
            port: config.uplink.port,
            access_token: config.uplink.access_token.clone(),
            topic: config.uplink.topic.clone(),
            ack_timeout: Duration::from_millis(config.uplink.ack_timeout_ms),
        });
        (Arc::new(uplink), Some(eventloop))
    } else {
        (Arc::new(LoggingTransport), None)
    };
    let dispatcher = UplinkDispatcher::new(
        storage.clone(),
        transport,
        UplinkDispatcherConfig {
            idle_interval: storage.no_records_sleep_interval(),
            retry_backoff: Duration::from_millis(config.uplink.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.uplink.max_backoff_ms),
        },
    );
    UplinkTasks {
        dispatcher: tokio::spawn(async move { dispatcher.run(shutdown).await }),
        eventloop,
    }
}
