use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gridsweep_core::{GridSweepError, LogRecord, Result};

use crate::parser::LogParser;

#[derive(Debug)]
pub struct HarvestFailure {
    pub path: PathBuf,
    pub error: GridSweepError,
}

/// Result of one pass over a results directory.
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: Vec<LogRecord>,
    pub failures: Vec<HarvestFailure>,
}

impl Harvest {
    /// Number of skipped files per error kind.
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.error.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Parses every `*/*.log` under `root`, in path order.
///
/// Only an unreadable `root` is an error; anything wrong with a single run
/// directory or log file is recorded as a failure and skipped.
pub fn harvest_dir(root: &Path, parser: &LogParser) -> Result<Harvest> {
    let mut run_dirs: Vec<PathBuf> = std::fs::read_dir(root)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    run_dirs.sort();

    let mut harvest = Harvest::default();
    let mut paths = Vec::new();
    for dir in run_dirs {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                harvest.failures.push(HarvestFailure {
                    path: dir,
                    error: e.into(),
                });
                continue;
            }
        };
        let mut logs: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
            .collect();
        logs.sort();
        paths.extend(logs);
    }

    tracing::info!("Harvesting {} log files under {}", paths.len(), root.display());
    collect(&paths, parser, &mut harvest);
    Ok(harvest)
}

/// Parses an explicit list of log files.
pub fn harvest_files(paths: &[PathBuf], parser: &LogParser) -> Harvest {
    let mut harvest = Harvest::default();
    collect(paths, parser, &mut harvest);
    harvest
}

fn collect(paths: &[PathBuf], parser: &LogParser, harvest: &mut Harvest) {
    for path in paths {
        match read_record(path, parser) {
            Ok(record) => harvest.records.push(record),
            Err(error) => {
                tracing::debug!("Skipping {}: {}", path.display(), error);
                harvest.failures.push(HarvestFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
    }

    if !harvest.failures.is_empty() {
        tracing::warn!(
            "{} of {} files could not be parsed",
            harvest.failures.len(),
            harvest.failures.len() + harvest.records.len()
        );
    }
}

fn read_record(path: &Path, parser: &LogParser) -> Result<LogRecord> {
    let name = path
        .to_str()
        .ok_or_else(|| GridSweepError::MalformedName(path.display().to_string()))?;
    let content = std::fs::read_to_string(path)?;
    parser.parse(name, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsweep_core::SweepKind;
    use tempfile::TempDir;

    fn write_log(root: &Path, dir: &str, file: &str, content: &str) {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_harvest_skips_bad_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_log(
            root,
            "swp_2_0_0",
            "out_2_0_0_c_1_1000000_2000000_1414_1415_4_2_r2.log",
            "ELAPSED TIME = 2.0 s\n",
        );
        write_log(
            root,
            "swp_2_0_0",
            "out_2_0_0_c_1_1000000_2000000_1414_1415_4_2_r1.log",
            "ELAPSED TIME = 1.0 s\n",
        );
        write_log(
            root,
            "swp_2_0_0",
            "out_2_0_0_o_1_1000000_2000000_1414_1415_4_2_r1.log",
            "crashed\n",
        );
        write_log(root, "swp_2_0_0", "notes.txt", "ignored");
        write_log(root, "junk", "whatever_r1.log", "ELAPSED TIME = 1.0 s\n");

        let parser = LogParser::new(SweepKind::Sweep.schema(), 4).unwrap();
        let harvest = harvest_dir(root, &parser).unwrap();

        let reps: Vec<u32> = harvest.records.iter().map(|r| r.repetition).collect();
        assert_eq!(reps, vec![1, 2]);
        assert_eq!(harvest.failures.len(), 2);

        let counts = harvest.failure_counts();
        assert_eq!(counts.get("malformed_name"), Some(&1));
        assert_eq!(counts.get("content_parse_failure"), Some(&1));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let parser = LogParser::new(SweepKind::Sweep.schema(), 4).unwrap();
        assert!(harvest_dir(&tmp.path().join("absent"), &parser).is_err());
    }

    #[test]
    fn test_harvest_files_records_io_errors() {
        let tmp = TempDir::new().unwrap();
        let parser = LogParser::new(SweepKind::Map.schema(), 4).unwrap();
        let missing = tmp.path().join("map_8_32_8/out_32_8_8_4_map_r1.log");

        let harvest = harvest_files(&[missing], &parser);
        assert!(harvest.records.is_empty());
        assert_eq!(harvest.failure_counts().get("io"), Some(&1));
    }
}
