use std::fs::File;
use std::path::Path;

use csv::{ErrorKind, ReaderBuilder};
use memchr::memchr_iter;
use memmap2::Mmap;
use tracing::{debug, info};

use crate::error::{CleanError, CleanResult};
use crate::normalizer::{self, NormalizeOutcome};
use crate::record::{COLUMN_COUNT, RawRecord};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub bytes: u64,
    pub lines: usize,
    pub rows: usize,
    /// Cells holding one of the sentinel tokens.
    pub sentinel_fields: usize,
}

#[derive(Debug)]
pub struct RawTable {
    pub records: Vec<RawRecord>,
    pub stats: LoadStats,
}

/// Read, then normalize. Both the exporter and the viewer come through here.
pub fn load_clean(path: &Path, nrows: Option<usize>) -> CleanResult<(NormalizeOutcome, LoadStats)> {
    let table = load_raw(path, nrows)?;
    let outcome = normalizer::normalize(table.records)?;
    Ok((outcome, table.stats))
}

pub fn load_raw(path: &Path, nrows: Option<usize>) -> CleanResult<RawTable> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(CleanError::ColumnCount {
            expected: COLUMN_COUNT,
            found: 0,
        });
    }

    // mmap the file
    let mmap = unsafe { Mmap::map(&file)? };
    let table = parse_bytes(&mmap, nrows)?;
    info!(
        path = %path.display(),
        rows = table.stats.rows,
        sentinels = table.stats.sentinel_fields,
        "loaded raw records"
    );
    Ok(table)
}

/// Parse CSV bytes. The header row only has to have the right width; its
/// names are replaced by the fixed schema.
pub fn parse_bytes(bytes: &[u8], nrows: Option<usize>) -> CleanResult<RawTable> {
    let lines = memchr_iter(b'\n', bytes).count();
    let limit = nrows.unwrap_or(usize::MAX);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let found = reader.headers()?.len();
    if found != COLUMN_COUNT {
        return Err(CleanError::ColumnCount {
            expected: COLUMN_COUNT,
            found,
        });
    }
    debug!(lines, "header accepted");

    let mut stats = LoadStats {
        bytes: bytes.len() as u64,
        lines,
        ..Default::default()
    };
    let mut records = Vec::with_capacity(lines.min(limit));

    for result in reader.records().take(limit) {
        let row = result.map_err(width_error)?;
        let mut record = RawRecord::default();
        for (slot, cell) in record.fields.iter_mut().zip(row.iter()) {
            *slot = normalizer::apply_sentinels(cell);
            if slot.is_none() && !cell.is_empty() {
                stats.sentinel_fields += 1;
            }
        }
        records.push(record);
    }

    stats.rows = records.len();
    Ok(RawTable { records, stats })
}

fn width_error(err: csv::Error) -> CleanError {
    match err.kind() {
        ErrorKind::UnequalLengths { len, .. } => CleanError::ColumnCount {
            expected: COLUMN_COUNT,
            found: *len as usize,
        },
        _ => CleanError::Csv(err),
    }
}
