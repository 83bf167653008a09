//! 规范化并写入事件存储
//!
//! 报文必须是 JSON 对象：
//! - 含 `values` 对象时按 `{"ts": .., "values": {..}, "attributes": {..}}` 解释，`ts` 缺省取接收时间
//! - 否则整个对象视为一组时序值

use crate::mqtt::parse_device_topic;
use crate::{IngestError, RawEventHandler};
use async_trait::async_trait;
use domain::{ConvertedData, RawEvent};
use gw_storage::EventStorage;
use gw_telemetry::record_dropped_invalid;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 把原始报文写入事件存储的处理器。
pub struct StorageSink {
    storage: Arc<dyn EventStorage>,
    topic_prefix: String,
}

impl StorageSink {
    pub fn new(storage: Arc<dyn EventStorage>, topic_prefix: impl Into<String>) -> Self {
        Self {
            storage,
            topic_prefix: topic_prefix.into(),
        }
    }
}

#[async_trait]
impl RawEventHandler for StorageSink {
    async fn handle(&self, event: RawEvent) -> Result<(), IngestError> {
        let data = match convert_payload(&self.topic_prefix, &event) {
            Ok(data) => data,
            Err(err) => {
                record_dropped_invalid();
                warn!(target: "gw.ingest", topic = %event.topic, error = %err, "raw_event_dropped");
                return Err(err);
            }
        };
        let record = data
            .to_record()
            .map_err(|err| IngestError::Handler(err.to_string()))?;

        // 文件存储的写入包含 fsync，放到阻塞线程执行
        let storage = self.storage.clone();
        let accepted = tokio::task::spawn_blocking(move || storage.put(record))
            .await
            .map_err(|err| IngestError::Handler(err.to_string()))?;
        if !accepted {
            return Err(IngestError::Rejected(data.device_name));
        }
        debug!(
            target: "gw.ingest",
            device = %data.device_name,
            device_type = %data.device_type,
            "raw_event_stored"
        );
        Ok(())
    }
}

/// 把原始报文转换为规范化设备消息
pub fn convert_payload(prefix: &str, event: &RawEvent) -> Result<ConvertedData, IngestError> {
    let device = parse_device_topic(prefix, &event.topic)
        .ok_or_else(|| IngestError::Topic(event.topic.clone()))?;
    let invalid = |reason: String| IngestError::InvalidPayload {
        topic: event.topic.clone(),
        reason,
    };
    let value: Value =
        serde_json::from_slice(&event.payload).map_err(|err| invalid(err.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(invalid("payload is not a JSON object".to_string()));
    };

    let mut data = ConvertedData::new(device.device_name, device.device_type);
    match object.remove("values") {
        Some(Value::Object(values)) => {
            let ts = object
                .get("ts")
                .and_then(Value::as_i64)
                .unwrap_or(event.received_at_ms);
            if let Some(Value::Object(attributes)) = object.remove("attributes") {
                data.attributes = attributes;
            }
            data.add_telemetry(ts, values);
        }
        Some(_) => return Err(invalid("`values` is not an object".to_string())),
        None => data.add_telemetry(event.received_at_ms, object),
    }
    if data.is_empty() {
        return Err(invalid("no telemetry or attributes".to_string()));
    }
    Ok(data)
}
