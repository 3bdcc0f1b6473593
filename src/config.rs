use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CleanError, CleanResult};

pub const DEFAULT_INPUT_DIR: &str = "input_data";
pub const DEFAULT_OUTPUT_DIR: &str = "output_data";
pub const OUTPUT_PREFIX: &str = "clean_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// An explicit file; used as given.
    File(PathBuf),
    /// A directory that must hold exactly one `.csv` file.
    Dir(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: InputSource,
    pub output_dir: PathBuf,
    /// Read at most this many data rows.
    pub nrows: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: InputSource::Dir(PathBuf::from(DEFAULT_INPUT_DIR)),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            nrows: None,
        }
    }
}

impl RunConfig {
    pub fn resolve_input(&self) -> CleanResult<PathBuf> {
        match &self.input {
            InputSource::File(path) => Ok(path.clone()),
            InputSource::Dir(dir) => discover_csv(dir),
        }
    }

    /// `<output_dir>/clean_<input file name>`. With `extension`, the input's
    /// extension is swapped for it; otherwise the name is kept whole.
    pub fn output_path(&self, input: &Path, extension: Option<&str>) -> PathBuf {
        let name = match extension {
            Some(extension) => {
                let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned());
                format!("{}.{extension}", stem.as_deref().unwrap_or("data"))
            }
            None => input
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "data.csv".to_string()),
        };
        self.output_dir.join(format!("{OUTPUT_PREFIX}{name}"))
    }
}

/// The single `*.csv` entry in `dir`. Zero or several matches are errors,
/// never resolved by listing order.
pub fn discover_csv(dir: &Path) -> CleanResult<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|source| CleanError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    candidates.sort();
    debug!(dir = %dir.display(), found = candidates.len(), "scanned input directory");

    match candidates.len() {
        0 => Err(CleanError::NoInputFile(dir.to_path_buf())),
        1 => Ok(candidates.remove(0)),
        _ => Err(CleanError::AmbiguousInput {
            dir: dir.to_path_buf(),
            candidates,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_the_only_csv() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("events.csv"), "a\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(discover_csv(dir.path()).unwrap(), dir.path().join("events.csv"));
    }

    #[test]
    fn empty_directory_is_a_config_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            discover_csv(dir.path()),
            Err(CleanError::NoInputFile(_))
        ));
    }

    #[test]
    fn several_csvs_are_rejected_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "").unwrap();
        fs::write(dir.path().join("a.csv"), "").unwrap();
        match discover_csv(dir.path()) {
            Err(CleanError::AmbiguousInput { candidates, .. }) => {
                assert_eq!(candidates, vec![dir.path().join("a.csv"), dir.path().join("b.csv")]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(matches!(discover_csv(&gone), Err(CleanError::InputDir { .. })));
    }

    #[test]
    fn output_path_is_prefixed() {
        let config = RunConfig {
            output_dir: PathBuf::from("out"),
            ..Default::default()
        };
        assert_eq!(
            config.output_path(Path::new("input_data/downtime.csv"), None),
            PathBuf::from("out/clean_downtime.csv")
        );
        assert_eq!(
            config.output_path(Path::new("downtime.csv"), Some("jsonl")),
            PathBuf::from("out/clean_downtime.jsonl")
        );
    }

    #[test]
    fn csv_output_keeps_the_original_file_name() {
        let config = RunConfig {
            output_dir: PathBuf::from("out"),
            ..Default::default()
        };
        assert_eq!(
            config.output_path(Path::new("logs/log.txt"), None),
            PathBuf::from("out/clean_log.txt")
        );
        assert_eq!(
            config.output_path(Path::new("plant.2021.csv"), None),
            PathBuf::from("out/clean_plant.2021.csv")
        );
        assert_eq!(
            config.output_path(Path::new("log.txt"), Some("tsv")),
            PathBuf::from("out/clean_log.tsv")
        );
    }
}
