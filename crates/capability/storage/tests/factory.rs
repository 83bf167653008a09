use gw_storage::{
    EventStorage, EventStorageBackend, FileStorageSettings, StorageKind, StorageSettings,
    build_event_storage,
};
use std::time::Duration;

#[test]
fn builds_memory_backend_by_default() {
    let storage = build_event_storage(StorageSettings::default()).expect("build");
    assert!(matches!(storage, EventStorageBackend::Memory(_)));
    assert_eq!(storage.kind(), StorageKind::Memory);
    assert!(storage.put("a".into()));
    assert_eq!(storage.get_event_pack().len(), 1);
}

#[test]
fn builds_file_backend_from_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let folder = dir.path().join("nested").join("data");
    let json = serde_json::json!({
        "type": "file",
        "dataFolderPath": folder,
        "maxRecordsPerFile": 2,
        "maxReadRecordsCount": 2,
        "noRecordsSleepIntervalMs": 250
    })
    .to_string();

    let storage = build_event_storage(StorageSettings::from_json(&json).expect("parse"))
        .expect("build");
    assert_eq!(storage.kind(), StorageKind::File);
    assert_eq!(storage.no_records_sleep_interval(), Duration::from_millis(250));
    assert!(folder.is_dir());

    for value in ["a", "b", "c"] {
        assert!(storage.put(value.into()));
    }
    assert_eq!(storage.status().data_files.len(), 2);
    assert_eq!(storage.get_event_pack().len(), 2);
}

#[test]
fn file_settings_default_folder() {
    let settings = FileStorageSettings::default();
    assert_eq!(settings.data_folder_path, std::path::PathBuf::from("./data/"));
    assert_eq!(settings.max_files_count, 10);
}
