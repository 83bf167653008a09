use domain::StorageRecord;
use gw_storage::{
    EventStorage, FileEventStorage, FileStorageSettings, ReaderPointer, STATE_FILE_NAME,
    StorageKind,
};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

fn settings(dir: &Path, max_records_per_file: usize, max_read_records_count: usize) -> FileStorageSettings {
    FileStorageSettings {
        data_folder_path: dir.to_path_buf(),
        max_records_per_file,
        max_read_records_count,
        max_records_between_fsync: 1,
        max_files_count: 1000,
        no_records_sleep_interval_ms: 10,
    }
}

fn open(dir: &Path, max_records_per_file: usize, max_read_records_count: usize) -> FileEventStorage {
    FileEventStorage::open(settings(dir, max_records_per_file, max_read_records_count))
        .expect("open storage")
}

fn put_range(storage: &FileEventStorage, range: std::ops::Range<usize>) {
    for i in range {
        assert!(storage.put(StorageRecord::from(i.to_string())), "put {i}");
    }
}

fn range(range: std::ops::Range<usize>) -> Vec<StorageRecord> {
    range.map(|i| StorageRecord::from(i.to_string())).collect()
}

fn data_files_on_disk(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("data_") && name.ends_with(".txt"))
        .collect();
    names.sort();
    names
}

fn line_count(path: &Path) -> usize {
    fs::read(path)
        .expect("read")
        .iter()
        .filter(|b| **b == b'\n')
        .count()
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).expect("open");
    file.write_all(bytes).expect("append");
}

fn drain(storage: &FileEventStorage) -> Vec<StorageRecord> {
    let mut delivered = Vec::new();
    loop {
        let pack = storage.get_event_pack();
        if pack.is_empty() {
            return delivered;
        }
        delivered.extend(pack);
        storage.event_pack_processing_done();
    }
}

#[test]
fn thirty_five_records_in_batches_of_ten() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..35);

    for expected in [0..10, 10..20, 20..30] {
        assert_eq!(storage.get_event_pack(), range(expected));
        storage.event_pack_processing_done();
    }
    assert_eq!(storage.get_event_pack(), range(30..35));
}

#[test]
fn concatenated_batches_equal_put_sequence() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 7, 9);
    put_range(&storage, 0..137);

    assert_eq!(drain(&storage), range(0..137));
    assert!(storage.get_event_pack().is_empty());
    assert_eq!(storage.len(), 0);
}

#[test]
fn unconfirmed_pack_is_returned_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 4);
    put_range(&storage, 0..6);

    let first = storage.get_event_pack();
    put_range(&storage, 6..8);
    let second = storage.get_event_pack();
    assert_eq!(first, range(0..4));
    assert_eq!(first, second);
}

#[test]
fn second_done_is_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..5);

    assert_eq!(storage.get_event_pack(), range(0..5));
    storage.event_pack_processing_done();
    let after_first = fs::read(dir.path().join(STATE_FILE_NAME)).expect("state");
    storage.event_pack_processing_done();
    let after_second = fs::read(dir.path().join(STATE_FILE_NAME)).expect("state");

    assert_eq!(after_first, after_second);
    assert!(storage.get_event_pack().is_empty());
    put_range(&storage, 5..6);
    assert_eq!(storage.get_event_pack(), range(5..6));
}

#[test]
fn uncommitted_pack_is_redelivered_after_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let storage = open(dir.path(), 10, 10);
        put_range(&storage, 0..15);
        assert_eq!(storage.get_event_pack(), range(0..10));
    }

    let storage = open(dir.path(), 10, 10);
    assert_eq!(storage.get_event_pack(), range(0..10));
    storage.event_pack_processing_done();
    assert_eq!(storage.get_event_pack(), range(10..15));
}

#[test]
fn committed_position_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let storage = open(dir.path(), 10, 10);
        put_range(&storage, 0..25);
        assert_eq!(storage.get_event_pack(), range(0..10));
        storage.event_pack_processing_done();
        assert_eq!(storage.get_event_pack(), range(10..20));
        storage.event_pack_processing_done();
    }

    let storage = open(dir.path(), 10, 10);
    assert_eq!(
        storage.reader_position().map(|pointer| pointer.line),
        Some(10)
    );
    put_range(&storage, 25..30);
    assert_eq!(drain(&storage), range(20..30));
}

#[test]
fn state_file_format() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 3);
    put_range(&storage, 0..5);
    let _ = storage.get_event_pack();
    storage.event_pack_processing_done();

    let state: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join(STATE_FILE_NAME)).expect("read"))
            .expect("json");
    let files = storage.data_files();
    assert_eq!(state["file"], files[0].as_str());
    assert_eq!(state["position"], 3);
    assert_eq!(
        storage.reader_position(),
        Some(ReaderPointer::new(files[0].clone(), 3))
    );
}

#[test]
fn rotation_produces_full_files_and_one_partial() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..25);

    let files = data_files_on_disk(dir.path());
    assert_eq!(files, storage.data_files());
    assert_eq!(files.len(), 3);
    let counts: Vec<usize> = files
        .iter()
        .map(|name| line_count(&dir.path().join(name)))
        .collect();
    assert_eq!(counts, vec![10, 10, 5]);
}

#[test]
fn exact_multiple_does_not_create_empty_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..20);
    assert_eq!(data_files_on_disk(dir.path()).len(), 2);
}

#[test]
fn writer_resumes_newest_file_after_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let storage = open(dir.path(), 10, 10);
        put_range(&storage, 0..5);
    }
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 5..15);

    let files = data_files_on_disk(dir.path());
    let counts: Vec<usize> = files
        .iter()
        .map(|name| line_count(&dir.path().join(name)))
        .collect();
    assert_eq!(counts, vec![10, 5]);
    assert_eq!(drain(&storage), range(0..15));
}

#[test]
fn drained_file_is_reclaimed_and_partially_read_file_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 15);
    put_range(&storage, 0..20);
    let files = storage.data_files();
    assert_eq!(files.len(), 2);

    assert_eq!(storage.get_event_pack(), range(0..15));
    assert!(dir.path().join(&files[0]).exists());
    storage.event_pack_processing_done();

    assert!(!dir.path().join(&files[0]).exists());
    assert!(dir.path().join(&files[1]).exists());
    assert_eq!(storage.data_files(), vec![files[1].clone()]);
    assert_eq!(storage.get_event_pack(), range(15..20));
}

#[test]
fn last_remaining_file_is_never_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..10);
    assert_eq!(drain(&storage), range(0..10));

    assert_eq!(data_files_on_disk(dir.path()).len(), 1);
    put_range(&storage, 10..12);
    assert_eq!(drain(&storage), range(10..12));
    assert_eq!(data_files_on_disk(dir.path()).len(), 1);
}

#[test]
fn corrupt_line_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    assert!(storage.put("a".into()));
    let file = dir.path().join(&storage.data_files()[0]);
    append_raw(&file, b"%%% not base64 %%%\n");
    assert!(storage.put("b".into()));

    assert_eq!(
        storage.get_event_pack(),
        vec![StorageRecord::from("a"), StorageRecord::from("b")]
    );
    storage.event_pack_processing_done();
    assert_eq!(storage.reader_position().map(|p| p.line), Some(3));
}

#[test]
fn partial_trailing_line_waits_for_newline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    assert!(storage.put("x".into()));
    let file = dir.path().join(&storage.data_files()[0]);
    append_raw(&file, b"YWJj");

    assert_eq!(storage.get_event_pack(), vec![StorageRecord::from("x")]);
    storage.event_pack_processing_done();
    assert!(storage.get_event_pack().is_empty());

    append_raw(&file, b"\n");
    assert_eq!(storage.get_event_pack(), vec![StorageRecord::from("abc")]);
}

#[test]
fn corrupt_state_file_falls_back_to_oldest_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let storage = open(dir.path(), 10, 10);
        put_range(&storage, 0..5);
        assert_eq!(storage.get_event_pack(), range(0..5));
        storage.event_pack_processing_done();
    }
    fs::write(dir.path().join(STATE_FILE_NAME), b"{\"file\": 12").expect("corrupt");

    let storage = open(dir.path(), 10, 10);
    assert_eq!(storage.get_event_pack(), range(0..5));
}

#[test]
fn state_file_pointing_to_missing_file_falls_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let storage = open(dir.path(), 10, 10);
        put_range(&storage, 0..3);
    }
    fs::write(
        dir.path().join(STATE_FILE_NAME),
        br#"{"file": "data_1.txt", "position": 2}"#,
    )
    .expect("write state");

    let storage = open(dir.path(), 10, 10);
    assert_eq!(storage.get_event_pack(), range(0..3));
}

#[test]
fn binary_payloads_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    let payload = StorageRecord::new(vec![b'{', b'\n', 0xff, 0xfe, b'\r', b'}']);
    assert!(storage.put(payload.clone()));
    assert!(storage.put("tail".into()));

    assert_eq!(
        storage.get_event_pack(),
        vec![payload, StorageRecord::from("tail")]
    );
}

#[test]
fn file_count_limit_rejects_until_files_are_reclaimed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = FileEventStorage::open(FileStorageSettings {
        max_files_count: 2,
        ..settings(dir.path(), 2, 3)
    })
    .expect("open");
    put_range(&storage, 0..4);
    assert!(!storage.put("4".into()));
    assert_eq!(data_files_on_disk(dir.path()).len(), 2);

    assert_eq!(storage.get_event_pack(), range(0..3));
    storage.event_pack_processing_done();
    assert_eq!(storage.data_files().len(), 1);

    assert!(storage.put("4".into()));
    assert_eq!(drain(&storage), range(3..5));
}

#[test]
fn stop_rejects_puts_and_allows_reads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..2);
    storage.stop();
    assert!(storage.is_stopped());
    assert!(!storage.put("2".into()));
    assert_eq!(storage.get_event_pack(), range(0..2));

    let status = storage.status();
    assert_eq!(status.kind, StorageKind::File);
    assert!(status.stopped);
    assert_eq!(status.pending_records, 2);
}

#[test]
fn pending_count_tracks_confirmed_position() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    put_range(&storage, 0..25);
    assert_eq!(storage.len(), 25);

    let _ = storage.get_event_pack();
    assert_eq!(storage.len(), 25);
    storage.event_pack_processing_done();
    assert_eq!(storage.len(), 15);
}

#[test]
fn concurrent_writers_lose_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(open(dir.path(), 50, 64));

    let handles: Vec<_> = (0..4)
        .map(|thread| {
            let storage = Arc::clone(&storage);
            std::thread::spawn(move || {
                for i in 0..250 {
                    assert!(storage.put(StorageRecord::from(format!("{thread}-{i}"))));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let delivered = drain(&storage);
    assert_eq!(delivered.len(), 1000);

    let mut next_expected: HashMap<String, usize> = HashMap::new();
    for record in delivered {
        let text = record.to_string_lossy();
        let (thread, index) = text.split_once('-').expect("format");
        let index: usize = index.parse().expect("index");
        let expected = next_expected.entry(thread.to_string()).or_insert(0);
        assert_eq!(index, *expected, "thread {thread} out of order");
        *expected += 1;
    }
    assert!(next_expected.values().all(|count| *count == 250));
}

#[test]
fn reader_consumes_while_writers_produce() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(open(dir.path(), 5, 7));

    let producer = {
        let storage = Arc::clone(&storage);
        std::thread::spawn(move || {
            for i in 0..200 {
                assert!(storage.put(StorageRecord::from(i.to_string())));
            }
        })
    };

    let mut delivered = Vec::new();
    while delivered.len() < 200 {
        let pack = storage.get_event_pack();
        if pack.is_empty() {
            std::thread::sleep(std::time::Duration::from_millis(1));
            continue;
        }
        delivered.extend(pack);
        storage.event_pack_processing_done();
    }
    producer.join().expect("producer");

    assert_eq!(delivered, range(0..200));
    assert!(storage.get_event_pack().is_empty());
}

#[test]
fn single_file_limit_still_accepts_after_full_drain() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = FileEventStorage::open(FileStorageSettings {
        max_files_count: 1,
        ..settings(dir.path(), 3, 10)
    })
    .expect("open");
    assert_eq!(storage.settings().max_files_count, 2);

    for round in 0..3 {
        let start = round * 3;
        put_range(&storage, start..start + 3);
        assert_eq!(drain(&storage), range(start..start + 3));
        assert_eq!(storage.len(), 0);
    }
    assert!(storage.data_files().len() <= 2);
}

#[test]
fn empty_records_keep_their_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = open(dir.path(), 10, 10);
    for value in ["a", "", "b"] {
        assert!(storage.put(value.into()));
    }

    let expected = vec![
        StorageRecord::from("a"),
        StorageRecord::new(Vec::new()),
        StorageRecord::from("b"),
    ];
    assert_eq!(storage.get_event_pack(), expected);
    drop(storage);

    let storage = open(dir.path(), 10, 10);
    assert_eq!(storage.get_event_pack(), expected);
}
