use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::Column;

/// Fatal conditions for a load/clean run. Anything not listed here is
/// absorbed into the missing marker instead.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("input directory {path:?} is not readable: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no .csv file found in {0:?}")]
    NoInputFile(PathBuf),
    #[error("expected exactly one .csv file in {dir:?}, found {}: {}", .candidates.len(), join_names(.candidates))]
    AmbiguousInput {
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },
    #[error("row {row}: cannot parse date {value:?}")]
    UnparseableDate { row: usize, value: String },
    #[error("year {year} is outside the data range {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },
    #[error("no row carries a date")]
    NoDates,
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{0}' is already a filter and cannot be used for grouping")]
    NotGroupable(Column),
    #[error("column '{0}' is not among the shown columns and cannot be used for grouping")]
    GroupNotShown(Column),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CleanResult<T> = Result<T, CleanError>;

fn join_names(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
