//! 网关运行配置加载。
//!
//! 全部来自环境变量（`GW_*`），缺省时使用默认值；数值格式错误返回
//! [`ConfigError::Invalid`]。

use std::env;
use std::path::PathBuf;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 存储后端类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Memory,
    File,
}

/// 事件存储配置。
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    /// 内存队列容量
    pub max_records_count: usize,
    /// 内存存储单批记录数
    pub read_records_count: usize,
    pub data_folder_path: PathBuf,
    pub max_files_count: usize,
    pub max_records_per_file: usize,
    pub max_read_records_count: usize,
    pub max_records_between_fsync: usize,
    pub no_records_sleep_interval_ms: u64,
}

/// 云端上行配置。
#[derive(Debug, Clone)]
pub struct UplinkConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub access_token: Option<String>,
    pub topic: String,
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 等待一批 PUBACK 的时限
    pub ack_timeout_ms: u64,
}

/// 网关运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub storage: StorageConfig,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_prefix: String,
    pub ingest_enabled: bool,
    pub uplink: UplinkConfig,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("GW_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let storage = StorageConfig::from_env()?;
        let mqtt_host = env::var("GW_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("GW_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("GW_MQTT_USERNAME");
        let mqtt_password = read_optional("GW_MQTT_PASSWORD");
        let mqtt_topic_prefix =
            env::var("GW_MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "gateway/devices".to_string());
        let ingest_enabled = read_bool_with_default("GW_INGEST", false);
        let uplink = UplinkConfig::from_env()?;

        Ok(Self {
            http_addr,
            storage,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_prefix,
            ingest_enabled,
            uplink,
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let storage_type = match env::var("GW_STORAGE_TYPE") {
            Ok(value) => parse_storage_type(&value)
                .ok_or_else(|| ConfigError::Invalid("GW_STORAGE_TYPE".to_string(), value))?,
            Err(_) => StorageType::Memory,
        };
        Ok(Self {
            storage_type,
            max_records_count: read_usize_with_default("GW_STORAGE_MAX_RECORDS_COUNT", 100_000)?,
            read_records_count: read_usize_with_default("GW_STORAGE_READ_RECORDS_COUNT", 100)?,
            data_folder_path: env::var("GW_STORAGE_DATA_FOLDER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/")),
            max_files_count: read_usize_with_default("GW_STORAGE_MAX_FILES_COUNT", 10)?,
            max_records_per_file: read_usize_with_default(
                "GW_STORAGE_MAX_RECORDS_PER_FILE",
                10_000,
            )?,
            max_read_records_count: read_usize_with_default(
                "GW_STORAGE_MAX_READ_RECORDS_COUNT",
                100,
            )?,
            max_records_between_fsync: read_usize_with_default(
                "GW_STORAGE_MAX_RECORDS_BETWEEN_FSYNC",
                1,
            )?,
            no_records_sleep_interval_ms: read_u64_with_default(
                "GW_STORAGE_NO_RECORDS_SLEEP_INTERVAL_MS",
                1000,
            )?,
        })
    }
}

impl UplinkConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: read_bool_with_default("GW_UPLINK", false),
            host: env::var("GW_UPLINK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: read_u16_with_default("GW_UPLINK_PORT", 1883)?,
            access_token: read_optional("GW_UPLINK_ACCESS_TOKEN"),
            topic: env::var("GW_UPLINK_TOPIC")
                .unwrap_or_else(|_| "v1/gateway/telemetry".to_string()),
            retry_backoff_ms: read_u64_with_default("GW_UPLINK_RETRY_BACKOFF_MS", 1000)?,
            max_backoff_ms: read_u64_with_default("GW_UPLINK_MAX_BACKOFF_MS", 30_000)?,
            ack_timeout_ms: read_u64_with_default("GW_UPLINK_ACK_TIMEOUT_MS", 10_000)?,
        })
    }
}

fn parse_storage_type(value: &str) -> Option<StorageType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" => Some(StorageType::Memory),
        "file" => Some(StorageType::File),
        _ => None,
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
