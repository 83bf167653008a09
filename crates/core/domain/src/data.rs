use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 事件存储中的一条记录。
///
/// 内容已由调用方完整序列化，存储层不解析、不修改。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageRecord(Vec<u8>);

impl StorageRecord {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self(payload.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 按 UTF-8 解释内容（非法字节以替换字符显示，仅用于日志和测试）。
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<String> for StorageRecord {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for StorageRecord {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for StorageRecord {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for StorageRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 连接器收到的原始报文。
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

/// 一组同一时刻的时序值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub ts: i64,
    pub values: Map<String, Value>,
}

/// 规范化后的设备消息（设备 + 属性 + 时序）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedData {
    pub device_name: String,
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub telemetry: Vec<TelemetryEntry>,
}

impl ConvertedData {
    pub fn new(device_name: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            device_type: device_type.into(),
            attributes: Map::new(),
            telemetry: Vec::new(),
        }
    }

    pub fn add_telemetry(&mut self, ts: i64, values: Map<String, Value>) {
        if values.is_empty() {
            return;
        }
        self.telemetry.push(TelemetryEntry { ts, values });
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.telemetry.is_empty()
    }

    /// 序列化为可直接写入事件存储的记录。
    pub fn to_record(&self) -> Result<StorageRecord, serde_json::Error> {
        serde_json::to_vec(self).map(StorageRecord::new)
    }
}
