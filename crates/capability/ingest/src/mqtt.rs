use crate::{IngestError, RawEventHandler, Source, now_epoch_ms};
use async_trait::async_trait;
use domain::RawEvent;
use gw_telemetry::record_raw_event;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 未带类型段的 topic 使用的设备类型。
pub const DEFAULT_DEVICE_TYPE: &str = "default";

/// MQTT 采集源配置。
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 订阅 `{topic_prefix}/#`
    pub topic_prefix: String,
}

/// MQTT 采集源。
#[derive(Debug, Clone)]
pub struct MqttSource {
    config: MqttSourceConfig,
}

impl MqttSource {
    pub fn new(config: MqttSourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MqttSourceConfig {
        &self.config
    }
}

#[async_trait]
impl Source for MqttSource {
    async fn run(&self, handler: Arc<dyn RawEventHandler>) -> Result<(), IngestError> {
        let client_id = format!("gw-ingest-{}", uuid::Uuid::new_v4());
        let mut options =
            MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let topic = format!("{}/#", self.config.topic_prefix.trim_end_matches('/'));
        client
            .subscribe(topic.clone(), QoS::AtLeastOnce)
            .await
            .map_err(|err| IngestError::Source(err.to_string()))?;
        info!(target: "gw.ingest", topic = %topic, "mqtt_source_subscribed");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if parse_device_topic(&self.config.topic_prefix, &publish.topic).is_none() {
                        warn!(target: "gw.ingest", topic = %publish.topic, "mqtt_topic_skipped");
                        continue;
                    }
                    record_raw_event();
                    let event = RawEvent {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                        received_at_ms: now_epoch_ms(),
                    };
                    if let Err(err) = handler.handle(event).await {
                        warn!(target: "gw.ingest", topic = %publish.topic, error = %err, "raw_event_handler_failed");
                    }
                }
                Ok(_) => {}
                Err(err) => return Err(IngestError::Source(err.to_string())),
            }
        }
    }
}

/// 从 topic 解析出的设备标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopic {
    pub device_name: String,
    pub device_type: String,
}

/// 解析 `{prefix}/{device}[/{type...}]`，类型可以包含多段。
pub fn parse_device_topic(prefix: &str, topic: &str) -> Option<DeviceTopic> {
    let prefix = prefix.trim_matches('/');
    let topic = topic.trim_matches('/');
    let rest = if prefix.is_empty() {
        topic
    } else {
        topic.strip_prefix(prefix)?.strip_prefix('/')?
    };
    let (device_name, device_type) = match rest.split_once('/') {
        Some((device, kind)) => (device, kind.trim_matches('/')),
        None => (rest, ""),
    };
    if device_name.is_empty() {
        return None;
    }
    let device_type = if device_type.is_empty() {
        DEFAULT_DEVICE_TYPE
    } else {
        device_type
    };
    Some(DeviceTopic {
        device_name: device_name.to_string(),
        device_type: device_type.to_string(),
    })
}
