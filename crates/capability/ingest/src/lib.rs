//! 设备接入边界：采集源把原始报文交给处理器，处理器规范化后写入事件存储。

mod mqtt;
mod sink;

pub use mqtt::{DEFAULT_DEVICE_TYPE, DeviceTopic, MqttSource, MqttSourceConfig, parse_device_topic};
pub use sink::{StorageSink, convert_payload};

use async_trait::async_trait;
use domain::RawEvent;
use std::sync::Arc;

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid payload on {topic}: {reason}")]
    InvalidPayload { topic: String, reason: String },
    #[error("topic not routable: {0}")]
    Topic(String),
    #[error("storage rejected record for {0}")]
    Rejected(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("source error: {0}")]
    Source(String),
}

/// RawEvent 处理器。
#[async_trait]
pub trait RawEventHandler: Send + Sync {
    async fn handle(&self, event: RawEvent) -> Result<(), IngestError>;
}

/// 采集源抽象。
#[async_trait]
pub trait Source: Send + Sync {
    async fn run(&self, handler: Arc<dyn RawEventHandler>) -> Result<(), IngestError>;
}

/// 占位源（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopSource;

#[async_trait]
impl Source for NoopSource {
    async fn run(&self, _handler: Arc<dyn RawEventHandler>) -> Result<(), IngestError> {
        Ok(())
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
