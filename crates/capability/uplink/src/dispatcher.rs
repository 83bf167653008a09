use crate::{UplinkError, UplinkTransport};
use gw_storage::EventStorage;
use gw_telemetry::{new_batch_id, record_uplink_failure, record_uplink_success};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 分发参数。
#[derive(Debug, Clone)]
pub struct UplinkDispatcherConfig {
    /// 无数据时的等待
    pub idle_interval: Duration,
    /// 首次失败后的退避，之后逐次翻倍
    pub retry_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for UplinkDispatcherConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(1000),
            retry_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
        }
    }
}

impl UplinkDispatcherConfig {
    fn sanitized(mut self) -> Self {
        if self.max_backoff < self.retry_backoff {
            self.max_backoff = self.retry_backoff;
        }
        self
    }
}

/// 单轮分发结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 存储为空
    Idle,
    /// 已发送并确认的记录数
    Delivered(usize),
    /// 发送失败，批次未确认
    Failed,
}

/// 上行分发器（事件存储的唯一消费者）。
pub struct UplinkDispatcher {
    storage: Arc<dyn EventStorage>,
    transport: Arc<dyn UplinkTransport>,
    config: UplinkDispatcherConfig,
}

impl UplinkDispatcher {
    pub fn new(
        storage: Arc<dyn EventStorage>,
        transport: Arc<dyn UplinkTransport>,
        config: UplinkDispatcherConfig,
    ) -> Self {
        Self {
            storage,
            transport,
            config: config.sanitized(),
        }
    }

    /// 执行一轮：取批次 → 发送 → 成功则确认
    pub async fn run_once(&self) -> Result<DispatchOutcome, UplinkError> {
        let storage = self.storage.clone();
        let pack = tokio::task::spawn_blocking(move || storage.get_event_pack())
            .await
            .map_err(|err| UplinkError::Storage(err.to_string()))?;
        if pack.is_empty() {
            return Ok(DispatchOutcome::Idle);
        }

        let batch_id = new_batch_id();
        let started_at = Instant::now();
        if let Err(err) = self.transport.send_batch(&batch_id, &pack).await {
            record_uplink_failure();
            warn!(
                target: "gw.uplink",
                batch_id = %batch_id,
                records = pack.len(),
                error = %err,
                "uplink_batch_failed"
            );
            return Ok(DispatchOutcome::Failed);
        }
        record_uplink_success(started_at.elapsed().as_millis() as u64);

        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || storage.event_pack_processing_done())
            .await
            .map_err(|err| UplinkError::Storage(err.to_string()))?;
        debug!(
            target: "gw.uplink",
            batch_id = %batch_id,
            records = pack.len(),
            "uplink_batch_delivered"
        );
        Ok(DispatchOutcome::Delivered(pack.len()))
    }

    /// 循环分发，直到 `shutdown` 变为 `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(target: "gw.uplink", "uplink_dispatcher_started");
        let mut backoff = self.config.retry_backoff;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let wait = match self.run_once().await {
                Ok(DispatchOutcome::Delivered(_)) => {
                    backoff = self.config.retry_backoff;
                    continue;
                }
                Ok(DispatchOutcome::Idle) => self.config.idle_interval,
                Ok(DispatchOutcome::Failed) => next_backoff(&mut backoff, self.config.max_backoff),
                Err(err) => {
                    warn!(target: "gw.uplink", error = %err, "uplink_cycle_failed");
                    next_backoff(&mut backoff, self.config.max_backoff)
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(target: "gw.uplink", "uplink_dispatcher_stopped");
    }
}

/// 返回本次等待，并把下一次退避翻倍（不超过上限）
fn next_backoff(backoff: &mut Duration, max: Duration) -> Duration {
    let wait = *backoff;
    *backoff = backoff.saturating_mul(2).min(max);
    wait
}
