use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use tracing::info;

use crate::dataset::CleanedDataset;
use crate::record::{CleanedRecord, Column};

const DAY_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
    Json,
    Jsonl,
    Stdout,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv | OutputFormat::Stdout => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        }
    }

    /// Extension that replaces the input's in the output name. CSV output
    /// keeps the input file name as it is.
    pub fn swapped_extension(self) -> Option<&'static str> {
        match self {
            OutputFormat::Csv | OutputFormat::Stdout => None,
            other => Some(other.extension()),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            "stdout" => Ok(OutputFormat::Stdout),
            other => Err(anyhow!(
                "Unknown output format: {}. Use csv, tsv, json, jsonl or stdout",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Stdout => f.write_str("stdout"),
            other => f.write_str(other.extension()),
        }
    }
}

pub enum Writer {
    /// CSV/TSV, to a file or stdout. The bool tracks whether the header is out.
    Delimited(csv::Writer<Box<dyn Write>>, bool),
    JsonFile(BufWriter<File>, bool), // bool tracks if we've written the opening bracket
    JsonlFile(BufWriter<File>),
}

impl Writer {
    /// `whole_days` picks the date-only rendering for the leading index column.
    pub fn write_batch(&mut self, records: &[CleanedRecord], whole_days: bool) -> Result<()> {
        match self {
            Writer::Delimited(writer, header_written) => {
                if !*header_written {
                    writer.write_field("date")?;
                    writer.write_record(Column::ALL.iter().map(|c| c.name()))?;
                    *header_written = true;
                }

                for record in records {
                    writer.write_field(format_index(record.date_key, whole_days))?;
                    writer.write_record(
                        Column::ALL
                            .iter()
                            .map(|c| record.value(*c).unwrap_or_default()),
                    )?;
                }
            }
            Writer::JsonFile(writer, is_first) => {
                for record in records {
                    if *is_first {
                        write!(writer, "[")?;
                        *is_first = false;
                    } else {
                        write!(writer, ",")?;
                    }
                    let serialized = serde_json::to_string_pretty(record)?;
                    write!(writer, "\n{}", serialized)?;
                }
            }
            Writer::JsonlFile(writer) => {
                for record in records {
                    let serialized = serde_json::to_string(record)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::JsonFile(ref mut writer, is_first) => {
                if is_first {
                    write!(writer, "[")?;
                }
                writeln!(writer, "\n]")?;
                writer.flush()?;
            }
            Writer::JsonlFile(ref mut writer) => {
                writer.flush()?;
            }
            Writer::Delimited(ref mut writer, _) => {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

pub fn create_writer(format: OutputFormat, path: &Path) -> Result<Writer> {
    let delimited = |delimiter: u8, sink: Box<dyn Write>| {
        csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(sink)
    };

    match format {
        OutputFormat::Stdout => Ok(Writer::Delimited(
            delimited(b',', Box::new(io::stdout())),
            false,
        )),
        OutputFormat::Csv | OutputFormat::Tsv => {
            let file = create_file(path)?;
            let delimiter = if format == OutputFormat::Tsv { b'\t' } else { b',' };
            Ok(Writer::Delimited(
                delimited(delimiter, Box::new(BufWriter::new(file))),
                false,
            ))
        }
        OutputFormat::Json => Ok(Writer::JsonFile(BufWriter::new(create_file(path)?), true)),
        OutputFormat::Jsonl => Ok(Writer::JsonlFile(BufWriter::new(create_file(path)?))),
    }
}

/// Write the whole dataset. Returns the path written, or `None` for stdout.
/// File output goes to a sibling staging file that is renamed into place
/// only once every record is flushed, so a failed run leaves no `path`.
pub fn export(dataset: &CleanedDataset, format: OutputFormat, path: &Path) -> Result<Option<PathBuf>> {
    if format == OutputFormat::Stdout {
        write_dataset(dataset, format, path)?;
        return Ok(None);
    }

    let staging = staging_path(path);
    let written = write_dataset(dataset, format, &staging).and_then(|()| {
        fs::rename(&staging, path)
            .with_context(|| format!("moving {} into place", path.display()))
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }

    info!(path = %path.display(), rows = dataset.len(), %format, "wrote cleaned data");
    Ok(Some(path.to_path_buf()))
}

fn write_dataset(dataset: &CleanedDataset, format: OutputFormat, path: &Path) -> Result<()> {
    let mut writer = create_writer(format, path)?;
    writer.write_batch(dataset.records(), dataset.dates_are_whole_days())?;
    writer.finish()
}

/// `.<name>.partial` next to `path`.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

fn create_file(path: &Path) -> Result<File> {
    create_parent_dirs(path)?;
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn create_parent_dirs(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    Ok(())
}

pub fn format_index(date_key: Option<NaiveDateTime>, whole_days: bool) -> String {
    let layout = if whole_days { DAY_FORMAT } else { TIMESTAMP_FORMAT };
    date_key
        .map(|d| d.format(layout).to_string())
        .unwrap_or_default()
}
