use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use fills_core::{FillRecord, Timestamp, RECORD_COLUMNS};
use fills_logging::fills_warn;

use crate::persist::{ensure_output_dir, PersistError};

/// Initial number of bytes read from the end of the store.
const TAIL_WINDOW: u64 = 64 * 1024;

/// Append-only record log with a last-record accessor.
pub trait RecordStore: Send {
    /// Timestamp of the last persisted record; `None` if the store is absent
    /// or holds no records.
    fn last_timestamp(&self) -> Result<Option<Timestamp>, PersistError>;

    /// The trailing run of records sharing the last timestamp, in store order.
    fn tail_records(&self) -> Result<Vec<FillRecord>, PersistError>;

    /// Append `records` as one unit. Returns how many rows were written.
    fn append(&mut self, records: &[FillRecord]) -> Result<usize, PersistError>;
}

/// CSV file store with the fixed eight-column header.
///
/// Bytes after the last newline are a torn write from an interrupted append.
/// Reads ignore them and the next append truncates them.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
    dir_ready: bool,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dir_ready: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn prepare_dir(&mut self) -> Result<(), PersistError> {
        if self.dir_ready {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_output_dir(parent)?;
        }
        self.dir_ready = true;
        Ok(())
    }
}

impl RecordStore for CsvRecordStore {
    fn last_timestamp(&self) -> Result<Option<Timestamp>, PersistError> {
        let Some((file, end)) = open_complete(&self.path)? else {
            return Ok(None);
        };
        let timestamp_col = read_columns(&file, end)?.timestamp;
        match tail_last_timestamp(&file, end, timestamp_col) {
            Ok(found) => Ok(found),
            Err(err) => {
                fills_warn!(
                    "Tail read of {:?} failed ({}); scanning whole store",
                    self.path,
                    err
                );
                scan_last_timestamp(&file, end, timestamp_col)
            }
        }
    }

    fn tail_records(&self) -> Result<Vec<FillRecord>, PersistError> {
        let Some((file, end)) = open_complete(&self.path)? else {
            return Ok(Vec::new());
        };
        let columns = read_columns(&file, end)?;
        let mut window = TAIL_WINDOW;
        loop {
            let tail = read_tail(&file, end, window)?;
            let mut rows = Vec::new();
            let mut boundary_seen = false;
            for line in tail.records().iter().rev() {
                let record = columns.to_record(&parse_line(line)?)?;
                let run_timestamp = rows.last().map(|row: &FillRecord| row.timestamp);
                if run_timestamp.is_some_and(|ts| ts != record.timestamp) {
                    boundary_seen = true;
                    break;
                }
                rows.push(record);
            }
            if boundary_seen || tail.reached_start {
                rows.reverse();
                return Ok(rows);
            }
            window = window.saturating_mul(2);
        }
    }

    fn append(&mut self, records: &[FillRecord]) -> Result<usize, PersistError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.prepare_dir()?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();
        let end = complete_len(&file, len)?;
        if end < len {
            fills_warn!(
                "Dropping {} bytes of torn trailing record from {:?}",
                len - end,
                self.path
            );
            file.set_len(end)?;
        }

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        if end == 0 {
            writer.write_record(RECORD_COLUMNS)?;
        }
        for record in records {
            writer.write_record(record.to_row())?;
        }
        let buffer = writer
            .into_inner()
            .map_err(|err| PersistError::Io(err.into_error()))?;

        file.write_all(&buffer)?;
        file.flush()?;
        file.sync_data()?;
        Ok(records.len())
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    timestamp: usize,
    maker: Option<usize>,
    maker_asset_id: Option<usize>,
    maker_amount_filled: Option<usize>,
    taker: Option<usize>,
    taker_asset_id: Option<usize>,
    taker_amount_filled: Option<usize>,
    transaction_hash: Option<usize>,
}

impl ColumnIndices {
    fn from_headers(headers: &StringRecord) -> Result<Self, PersistError> {
        let lookup = |name: &str| headers.iter().position(|h| h.trim() == name);
        let timestamp = lookup("timestamp").ok_or_else(|| {
            PersistError::Malformed("header has no timestamp column".to_string())
        })?;
        Ok(Self {
            timestamp,
            maker: lookup("maker"),
            maker_asset_id: lookup("makerAssetId"),
            maker_amount_filled: lookup("makerAmountFilled"),
            taker: lookup("taker"),
            taker_asset_id: lookup("takerAssetId"),
            taker_amount_filled: lookup("takerAmountFilled"),
            transaction_hash: lookup("transactionHash"),
        })
    }

    fn to_record(&self, row: &StringRecord) -> Result<FillRecord, PersistError> {
        let field = |index: Option<usize>, name: &str| {
            index
                .and_then(|i| row.get(i))
                .map(str::to_owned)
                .ok_or_else(|| PersistError::Malformed(format!("row is missing {name}")))
        };
        Ok(FillRecord {
            timestamp: parse_timestamp(row, self.timestamp)?,
            maker: field(self.maker, "maker")?,
            maker_asset_id: field(self.maker_asset_id, "makerAssetId")?,
            maker_amount_filled: field(self.maker_amount_filled, "makerAmountFilled")?,
            taker: field(self.taker, "taker")?,
            taker_asset_id: field(self.taker_asset_id, "takerAssetId")?,
            taker_amount_filled: field(self.taker_amount_filled, "takerAmountFilled")?,
            transaction_hash: field(self.transaction_hash, "transactionHash")?,
        })
    }
}

/// Complete, non-blank lines at the end of a file.
struct Tail {
    lines: Vec<String>,
    /// The window reached byte 0, so `lines[0]` is the header.
    reached_start: bool,
}

impl Tail {
    /// Lines that hold records (header excluded).
    fn records(&self) -> &[String] {
        if self.reached_start {
            self.lines.get(1..).unwrap_or_default()
        } else {
            &self.lines
        }
    }
}

/// Open the store and return it with the length of its complete lines.
/// `None` when the store is absent or holds no complete line.
fn open_complete(path: &Path) -> Result<Option<(File, u64)>, PersistError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let len = file.metadata()?.len();
    let end = complete_len(&file, len)?;
    Ok((end > 0).then_some((file, end)))
}

/// Offset just past the last newline in the first `len` bytes.
fn complete_len(file: &File, len: u64) -> Result<u64, PersistError> {
    let mut reader = file;
    let mut chunk = [0u8; 8192];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(chunk.len() as u64);
        let buf = &mut chunk[..(end - start) as usize];
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(buf)?;
        if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

fn read_columns(file: &File, end: u64) -> Result<ColumnIndices, PersistError> {
    let mut reader = file;
    reader.seek(SeekFrom::Start(0))?;
    let mut csv = ReaderBuilder::new().from_reader(reader.take(end));
    ColumnIndices::from_headers(csv.headers()?)
}

fn tail_last_timestamp(
    file: &File,
    end: u64,
    timestamp_col: usize,
) -> Result<Option<Timestamp>, PersistError> {
    let tail = read_tail(file, end, TAIL_WINDOW)?;
    match tail.records().last() {
        Some(line) => parse_timestamp(&parse_line(line)?, timestamp_col).map(Some),
        None if tail.reached_start => Ok(None),
        None => Err(PersistError::Malformed(
            "no complete line in store tail".to_string(),
        )),
    }
}

fn scan_last_timestamp(
    file: &File,
    end: u64,
    timestamp_col: usize,
) -> Result<Option<Timestamp>, PersistError> {
    let mut reader = file;
    reader.seek(SeekFrom::Start(0))?;
    let mut csv = ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader.take(end));
    let mut last = None;
    for record in csv.records() {
        last = Some(record?);
    }
    last.map(|record| parse_timestamp(&record, timestamp_col))
        .transpose()
}

/// Read the complete lines in the `window` bytes before `end`.
fn read_tail(file: &File, end: u64, window: u64) -> Result<Tail, PersistError> {
    let start = end.saturating_sub(window);
    let mut reader = file;
    reader.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    reader.take(end - start).read_to_end(&mut buf)?;

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
    if start > 0 && !lines.is_empty() {
        // First line of a mid-file window may be cut.
        lines.remove(0);
    }
    lines.retain(|line| !line.trim().is_empty());
    Ok(Tail {
        lines,
        reached_start: start == 0,
    })
}

fn parse_line(line: &str) -> Result<StringRecord, PersistError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?),
        None => Err(PersistError::Malformed(format!("unparseable line {line:?}"))),
    }
}

fn parse_timestamp(record: &StringRecord, column: usize) -> Result<Timestamp, PersistError> {
    let raw = record
        .get(column)
        .ok_or_else(|| PersistError::Malformed("row has no timestamp field".to_string()))?;
    raw.trim()
        .parse::<Timestamp>()
        .map_err(|err| PersistError::Malformed(format!("bad timestamp {raw:?}: {err}")))
}
