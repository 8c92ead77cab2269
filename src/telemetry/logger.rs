//! Rotating JSON Lines status logger
//!
//! Files are named `status_<YYYYmmdd_HHMMSS>_<n>.jsonl`, where the timestamp
//! is the logger start time and `n` counts files within the session. A new
//! file is opened every `max_records_per_file` records; older files beyond
//! `max_files_to_keep` are deleted.

use chrono::Local;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::types::StatusRecord;
use crate::config::TelemetryConfig;
use crate::error::{RcBridgeError, Result};

const FILE_PREFIX: &str = "status_";
const FILE_SUFFIX: &str = ".jsonl";

/// Appends [`StatusRecord`]s to rotating JSONL files.
#[derive(Debug)]
pub struct StatusLogger {
    dir: PathBuf,
    session: String,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    file_index: u32,
}

impl StatusLogger {
    /// Creates a logger writing into `dir`, creating it if needed.
    ///
    /// No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` error if a limit is zero, or `Io` if the directory
    /// cannot be created
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        if max_records_per_file == 0 || max_files_to_keep == 0 {
            return Err(RcBridgeError::Telemetry(
                "record and file limits must be greater than 0".to_string(),
            ));
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            session: Local::now().format("%Y%m%d_%H%M%S").to_string(),
            max_records_per_file,
            max_files_to_keep,
            writer: None,
            current_path: None,
            records_in_file: 0,
            file_index: 0,
        })
    }

    /// Creates a logger from the `[telemetry]` section.
    ///
    /// # Errors
    ///
    /// See [`StatusLogger::new`]
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// File currently being written, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Appends one record as a JSON line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` errors from writing, or from opening the next
    /// file on rotation
    pub fn log(&mut self, record: &StatusRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RcBridgeError::Telemetry("no open log file".to_string()))?;

        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.records_in_file += 1;
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.file_index += 1;
        let path = self.dir.join(format!(
            "{}{}_{:04}{}",
            FILE_PREFIX, self.session, self.file_index, FILE_SUFFIX
        ));
        let file = File::create(&path)?;
        info!("Telemetry log: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Deletes the oldest log files beyond `max_files_to_keep`.
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_status_log(path))
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort_by_cached_key(|path| log_order(path));
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old telemetry log {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl Drop for StatusLogger {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

/// Sort key `(session, file index)`; the index is compared numerically so
/// that `_10000` follows `_9999`.
fn log_order(path: &Path) -> (String, u32) {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(FILE_PREFIX))
        .and_then(|name| name.strip_suffix(FILE_SUFFIX))
        .unwrap_or_default();

    match stem.rsplit_once('_') {
        Some((session, index)) => (session.to_string(), index.parse().unwrap_or(0)),
        None => (stem.to_string(), 0),
    }
}

fn is_status_log(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlStatus;
    use tempfile::TempDir;

    fn record(cycles: u64) -> StatusRecord {
        let status = ControlStatus { cycles, ..ControlStatus::default() };
        StatusRecord::new(&status, 0, 3_200)
    }

    fn log_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| is_status_log(p))
            .collect();
        files.sort();
        files
    }

    fn read_records(path: &Path) -> Vec<StatusRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_zero_limits_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(StatusLogger::new(dir.path(), 0, 10).is_err());
        assert!(StatusLogger::new(dir.path(), 10, 0).is_err());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let _logger = StatusLogger::new(&nested, 10, 10).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_no_file_before_first_record() {
        let dir = TempDir::new().unwrap();
        let logger = StatusLogger::new(dir.path(), 10, 10).unwrap();
        assert!(logger.current_path().is_none());
        assert!(log_files(dir.path()).is_empty());
    }

    #[test]
    fn test_records_written_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let mut logger = StatusLogger::new(dir.path(), 10, 10).unwrap();

        for cycles in 1..=3 {
            logger.log(&record(cycles)).unwrap();
        }

        let path = logger.current_path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("status_"));
        assert!(name.ends_with("_0001.jsonl"));

        let records = read_records(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].cycles, 3);
    }

    #[test]
    fn test_rotates_after_max_records() {
        let dir = TempDir::new().unwrap();
        let mut logger = StatusLogger::new(dir.path(), 2, 10).unwrap();

        for cycles in 1..=5 {
            logger.log(&record(cycles)).unwrap();
        }

        let files = log_files(dir.path());
        assert_eq!(files.len(), 3);
        assert_eq!(read_records(&files[0]).len(), 2);
        assert_eq!(read_records(&files[1]).len(), 2);
        assert_eq!(read_records(&files[2])[0].cycles, 5);
    }

    #[test]
    fn test_keeps_only_newest_files() {
        let dir = TempDir::new().unwrap();
        let mut logger = StatusLogger::new(dir.path(), 1, 2).unwrap();

        for cycles in 1..=4 {
            logger.log(&record(cycles)).unwrap();
        }

        let files = log_files(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(read_records(&files[0])[0].cycles, 3);
        assert_eq!(read_records(&files[1])[0].cycles, 4);
    }

    #[test]
    fn test_prune_orders_index_numerically() {
        let dir = TempDir::new().unwrap();
        for name in [
            "status_20240101_000000_0003.jsonl",
            "status_20240102_000000_9999.jsonl",
            "status_20240102_000000_10000.jsonl",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let logger = StatusLogger::new(dir.path(), 10, 2).unwrap();
        logger.prune().unwrap();

        let mut names: Vec<String> = log_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "status_20240102_000000_10000.jsonl".to_string(),
                "status_20240102_000000_9999.jsonl".to_string(),
            ]
        );
    }

    #[test]
    fn test_log_order() {
        assert!(
            log_order(Path::new("status_20240102_000000_9999.jsonl"))
                < log_order(Path::new("status_20240102_000000_10000.jsonl"))
        );
        assert!(
            log_order(Path::new("status_20240102_000000_0002.jsonl"))
                < log_order(Path::new("status_20240103_000000_0001.jsonl"))
        );
    }

    #[test]
    fn test_unrelated_files_untouched() {
        let dir = TempDir::new().unwrap();
        let other = dir.path().join("notes.txt");
        fs::write(&other, "keep me").unwrap();

        let mut logger = StatusLogger::new(dir.path(), 1, 1).unwrap();
        for cycles in 1..=3 {
            logger.log(&record(cycles)).unwrap();
        }

        assert!(other.exists());
        assert_eq!(log_files(dir.path()).len(), 1);
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let config = TelemetryConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().into_owned(),
            max_records_per_file: 100,
            max_files_to_keep: 3,
            format: "jsonl".to_string(),
        };

        let mut logger = StatusLogger::from_config(&config).unwrap();
        logger.log(&record(1)).unwrap();
        assert_eq!(log_files(dir.path()).len(), 1);
    }
}
