//! QoS 1 发布确认跟踪
//!
//! `AsyncClient::publish` 只把请求放进事件循环队列。事件循环把
//! `Outgoing::Publish(pkid)` 与 `Incoming(PubAck)` 转发到这里，
//! 一批记录全部收到 PUBACK 后才算送达。

use crate::UplinkError;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryEvent {
    /// 发布报文已写到连接上
    Sent(u16),
    /// 收到对端 PUBACK
    Acked(u16),
    /// 连接中断，未确认的发布不再可信
    Disconnected,
}

pub(crate) struct AckTracker {
    events: mpsc::UnboundedReceiver<DeliveryEvent>,
}

impl AckTracker {
    pub(crate) fn new(events: mpsc::UnboundedReceiver<DeliveryEvent>) -> Self {
        Self { events }
    }

    /// 丢弃上一批遗留的事件
    pub(crate) fn reset(&mut self) {
        while self.events.try_recv().is_ok() {}
    }

    /// 等待 `expected` 条发布全部被确认
    pub(crate) async fn wait(
        &mut self,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), UplinkError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut sent = 0usize;
        let mut acked = 0usize;
        let mut pending = HashSet::new();
        while sent < expected || !pending.is_empty() {
            let event = match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    return Err(UplinkError::Unacknowledged {
                        missing: expected.saturating_sub(acked),
                        expected,
                    });
                }
            };
            match event {
                Some(DeliveryEvent::Sent(pkid)) => {
                    sent += 1;
                    pending.insert(pkid);
                }
                Some(DeliveryEvent::Acked(pkid)) => {
                    if pending.remove(&pkid) {
                        acked += 1;
                    }
                }
                Some(DeliveryEvent::Disconnected) => {
                    return Err(UplinkError::Transport(
                        "connection lost before all publishes were acknowledged".to_string(),
                    ));
                }
                None => {
                    return Err(UplinkError::Transport("mqtt event loop stopped".to_string()));
                }
            }
        }
        Ok(())
    }
}
