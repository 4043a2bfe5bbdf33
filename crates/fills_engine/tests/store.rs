use std::fs;

use fills_core::{FillRecord, Timestamp};
use fills_engine::{ensure_output_dir, CsvRecordStore, PersistError, RecordStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const HEADER: &str = "timestamp,maker,makerAssetId,makerAmountFilled,taker,takerAssetId,takerAmountFilled,transactionHash";

fn record(timestamp: Timestamp, tx: &str) -> FillRecord {
    FillRecord {
        timestamp,
        maker: "0xmaker".to_string(),
        maker_asset_id: "0".to_string(),
        maker_amount_filled: "100".to_string(),
        taker: "0xtaker".to_string(),
        taker_asset_id: "42".to_string(),
        taker_amount_filled: "50".to_string(),
        transaction_hash: tx.to_string(),
    }
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("goldsky");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn first_append_writes_header_then_rows() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("goldsky").join("orderFilled.csv");
    let mut store = CsvRecordStore::new(&path);

    let written = store.append(&[record(1, "0xa"), record(2, "0xb")]).unwrap();
    assert_eq!(written, 2);
    let written = store.append(&[record(3, "0xc")]).unwrap();
    assert_eq!(written, 1);

    let content = fs::read_to_string(&path).unwrap();
    let expected = format!(
        "{HEADER}\n1,0xmaker,0,100,0xtaker,42,50,0xa\n2,0xmaker,0,100,0xtaker,42,50,0xb\n3,0xmaker,0,100,0xtaker,42,50,0xc\n"
    );
    assert_eq!(content, expected);
}

#[test]
fn empty_append_does_not_create_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    let mut store = CsvRecordStore::new(&path);

    assert_eq!(store.append(&[]).unwrap(), 0);
    assert!(!path.exists());
}

#[test]
fn append_truncates_torn_trailing_record() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    fs::write(&path, format!("{HEADER}\n1,m,0,1,t,2,3,0xa\n17")).unwrap();
    let mut store = CsvRecordStore::new(&path);

    store.append(&[record(2, "0xb")]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        format!("{HEADER}\n1,m,0,1,t,2,3,0xa\n2,0xmaker,0,100,0xtaker,42,50,0xb\n")
    );
    assert_eq!(store.last_timestamp().unwrap(), Some(2));
}

#[test]
fn torn_header_is_rewritten_on_first_append() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    fs::write(&path, "timestamp,mak").unwrap();
    let mut store = CsvRecordStore::new(&path);
    assert_eq!(store.last_timestamp().unwrap(), None);

    store.append(&[record(5, "0xa")]).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, format!("{HEADER}\n5,0xmaker,0,100,0xtaker,42,50,0xa\n"));
}

#[test]
fn reads_ignore_torn_trailing_record() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    fs::write(
        &path,
        format!("{HEADER}\n1700000100,m,0,1,t,2,3,0xa\n1700000101,m,0,1,t,2,3,0xb\n17"),
    )
    .unwrap();
    let store = CsvRecordStore::new(&path);

    assert_eq!(store.last_timestamp().unwrap(), Some(1_700_000_101));
    let tail = store.tail_records().unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].transaction_hash, "0xb");
}

#[test]
fn last_timestamp_of_missing_or_header_only_store_is_none() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    let store = CsvRecordStore::new(&path);
    assert_eq!(store.last_timestamp().unwrap(), None);

    fs::write(&path, format!("{HEADER}\n")).unwrap();
    assert_eq!(store.last_timestamp().unwrap(), None);
    assert!(store.tail_records().unwrap().is_empty());
}

#[test]
fn last_timestamp_follows_header_column_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    fs::write(&path, "maker,timestamp,extra\nm,10,x\nm,17,y\n").unwrap();

    let store = CsvRecordStore::new(&path);
    assert_eq!(store.last_timestamp().unwrap(), Some(17));
}

#[test]
fn last_timestamp_rejects_store_without_timestamp_column() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();

    let store = CsvRecordStore::new(&path);
    assert!(matches!(
        store.last_timestamp(),
        Err(PersistError::Malformed(_))
    ));
}

#[test]
fn last_timestamp_falls_back_to_full_scan_for_multiline_tail() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    // The last record has a quoted field spanning two lines.
    fs::write(&path, "timestamp,note\n5,plain\n9,\"two\nlines\"\n").unwrap();

    let store = CsvRecordStore::new(&path);
    assert_eq!(store.last_timestamp().unwrap(), Some(9));
}

#[test]
fn tail_records_returns_trailing_run_of_last_timestamp() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    let mut store = CsvRecordStore::new(&path);
    store
        .append(&[record(7, "0x1"), record(8, "0x2"), record(8, "0x3")])
        .unwrap();

    let tail = store.tail_records().unwrap();
    assert_eq!(tail, vec![record(8, "0x2"), record(8, "0x3")]);
}

#[test]
fn tail_records_spanning_more_than_one_window() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orderFilled.csv");
    let mut store = CsvRecordStore::new(&path);
    let mut rows = vec![record(1, "0xfirst")];
    rows.extend((0..3000).map(|i| record(2, &format!("0x{i:060}"))));
    store.append(&rows).unwrap();
    assert!(fs::metadata(&path).unwrap().len() > 128 * 1024);

    let tail = store.tail_records().unwrap();
    assert_eq!(tail.len(), 3000);
    assert_eq!(tail[0], record(2, &format!("0x{:060}", 0)));
}

#[test]
fn append_into_unwritable_location_fails() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let mut store = CsvRecordStore::new(blocker.join("orderFilled.csv"));
    let err = store.append(&[record(1, "0xa")]).unwrap_err();
    assert!(matches!(err, PersistError::OutputDir(_)));
}

#[test]
fn output_directory_is_checked_on_first_append_only() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("goldsky");
    let mut store = CsvRecordStore::new(dir.join("orderFilled.csv"));
    store.append(&[record(1, "0xa")]).unwrap();

    fs::remove_dir_all(&dir).unwrap();
    let err = store.append(&[record(2, "0xb")]).unwrap_err();
    assert!(matches!(err, PersistError::Io(_)));
}
