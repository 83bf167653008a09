use crate::UplinkError;
use crate::ack::{AckTracker, DeliveryEvent};
use async_trait::async_trait;
use domain::StorageRecord;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

/// 上行传输抽象。
#[async_trait]
pub trait UplinkTransport: Send + Sync {
    /// 发送一批记录；返回 `Ok` 表示整批已被对端接收。
    async fn send_batch(&self, batch_id: &str, records: &[StorageRecord])
    -> Result<(), UplinkError>;
}

/// 仅记录日志的传输（未启用上行时使用）。
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl UplinkTransport for LoggingTransport {
    async fn send_batch(
        &self,
        batch_id: &str,
        records: &[StorageRecord],
    ) -> Result<(), UplinkError> {
        let bytes: usize = records.iter().map(StorageRecord::len).sum();
        info!(
            target: "gw.uplink",
            batch_id = %batch_id,
            records = records.len(),
            bytes,
            "uplink_batch_logged"
        );
        Ok(())
    }
}

/// MQTT 上行配置。
#[derive(Debug, Clone)]
pub struct MqttUplinkConfig {
    pub host: String,
    pub port: u16,
    /// 作为 MQTT 用户名发送
    pub access_token: Option<String>,
    pub topic: String,
    /// 等待整批 PUBACK 的时限
    pub ack_timeout: Duration,
}

/// MQTT 上行实现（QoS 1 发布每条记录，收齐 PUBACK 才算送达）。
#[derive(Clone)]
pub struct MqttUplink {
    client: AsyncClient,
    topic: String,
    ack_timeout: Duration,
    acks: Arc<Mutex<AckTracker>>,
}

impl MqttUplink {
    pub fn connect(config: MqttUplinkConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let client_id = format!("gw-uplink-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let Some(token) = config.access_token {
            options.set_credentials(token, "");
        }
        let (client, mut eventloop) = AsyncClient::new(options, 100);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            loop {
                let event = match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(pkid))) => DeliveryEvent::Sent(pkid),
                    Ok(Event::Incoming(Packet::PubAck(ack))) => DeliveryEvent::Acked(ack.pkid),
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(target: "gw.uplink", error = %err, "mqtt_uplink_eventloop_error");
                        let _ = events_tx.send(DeliveryEvent::Disconnected);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                let _ = events_tx.send(event);
            }
        });
        (
            Self {
                client,
                topic: config.topic,
                ack_timeout: config.ack_timeout,
                acks: Arc::new(Mutex::new(AckTracker::new(events_rx))),
            },
            handle,
        )
    }
}

#[async_trait]
impl UplinkTransport for MqttUplink {
    async fn send_batch(
        &self,
        batch_id: &str,
        records: &[StorageRecord],
    ) -> Result<(), UplinkError> {
        // 同一时刻只跟踪一批
        let mut acks = self.acks.lock().await;
        acks.reset();
        for record in records {
            self.client
                .publish(self.topic.as_str(), QoS::AtLeastOnce, false, record.as_bytes().to_vec())
                .await
                .map_err(|err| UplinkError::Transport(err.to_string()))?;
        }
        acks.wait(records.len(), self.ack_timeout).await?;
        info!(
            target: "gw.uplink",
            batch_id = %batch_id,
            topic = %self.topic,
            records = records.len(),
            "uplink_batch_acknowledged"
        );
        Ok(())
    }
}
