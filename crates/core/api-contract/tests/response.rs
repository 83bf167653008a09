use api_contract::{ApiResponse, StorageStatusDto};

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error("STORAGE.UNAVAILABLE", "storage stopped");
    assert!(!response.success);
    assert!(response.data.is_none());
    assert!(response.error.is_some());
}

#[test]
fn storage_status_serializes_camel_case() {
    let dto = StorageStatusDto {
        kind: "file".to_string(),
        stopped: false,
        pending_records: 12,
        data_files: vec!["data_1700000000000.txt".to_string()],
    };
    let value = serde_json::to_value(&dto).expect("json");
    assert_eq!(value["pendingRecords"], 12);
    assert_eq!(value["dataFiles"][0], "data_1700000000000.txt");
}
