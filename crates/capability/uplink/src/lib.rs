//! 上行分发：从事件存储取批次，发送到云端，成功后确认。
//!
//! 发送失败时不确认，下一轮重新取到同一批次（至少一次投递）。

mod ack;
mod dispatcher;
mod transport;

pub use dispatcher::{DispatchOutcome, UplinkDispatcher, UplinkDispatcherConfig};
pub use transport::{LoggingTransport, MqttUplink, MqttUplinkConfig, UplinkTransport};

/// 上行错误。
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("broker did not acknowledge {missing} of {expected} records")]
    Unacknowledged { missing: usize, expected: usize },
    #[error("storage task failed: {0}")]
    Storage(String),
}
