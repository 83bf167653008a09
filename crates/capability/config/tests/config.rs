use gw_config::{AppConfig, ConfigError, StorageType};
use std::path::PathBuf;

// 环境变量是进程级共享状态，读写放在同一个测试里顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("GW_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("GW_STORAGE_TYPE", "file");
        std::env::set_var("GW_STORAGE_DATA_FOLDER_PATH", "/var/lib/gw/data");
        std::env::set_var("GW_STORAGE_MAX_RECORDS_PER_FILE", "500");
        std::env::set_var("GW_UPLINK", "true");
        std::env::set_var("GW_UPLINK_ACCESS_TOKEN", "token-1");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.storage.storage_type, StorageType::File);
    assert_eq!(config.storage.data_folder_path, PathBuf::from("/var/lib/gw/data"));
    assert_eq!(config.storage.max_records_per_file, 500);
    assert_eq!(config.storage.max_read_records_count, 100);
    assert_eq!(config.storage.max_records_between_fsync, 1);
    assert_eq!(config.storage.max_files_count, 10);
    assert_eq!(config.mqtt_topic_prefix, "gateway/devices");
    assert!(!config.ingest_enabled);
    assert!(config.uplink.enabled);
    assert_eq!(config.uplink.access_token.as_deref(), Some("token-1"));
    assert_eq!(config.uplink.topic, "v1/gateway/telemetry");
    assert_eq!(config.uplink.max_backoff_ms, 30_000);
    assert_eq!(config.uplink.ack_timeout_ms, 10_000);

    unsafe {
        std::env::set_var("GW_STORAGE_MAX_FILES_COUNT", "many");
    }
    let err = AppConfig::from_env().expect_err("invalid number");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "GW_STORAGE_MAX_FILES_COUNT"));

    unsafe {
        std::env::remove_var("GW_STORAGE_MAX_FILES_COUNT");
        std::env::set_var("GW_STORAGE_TYPE", "sqlite");
    }
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid(key, _)) if key == "GW_STORAGE_TYPE"
    ));
}
