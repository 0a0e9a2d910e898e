//! Logging configuration using tracing

use crate::logs::operational_log_path;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};

/// Appends to `manage_<YYYYMMDD>.log`, picking the file per event so a
/// long-running invocation rolls over at midnight.
#[derive(Debug, Clone)]
pub struct DailyLog {
    dir: PathBuf,
}

impl DailyLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn open(&self) -> io::Result<fs::File> {
        fs::create_dir_all(&self.dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(operational_log_path(&self.dir, Local::now().date_naive()))
    }
}

impl<'a> MakeWriter<'a> for DailyLog {
    type Writer = Box<dyn Write + Send>;

    fn make_writer(&'a self) -> Self::Writer {
        match self.open() {
            Ok(file) => Box::new(file),
            // Logging must never take the tool down
            Err(_) => Box::new(io::sink()),
        }
    }
}

/// Initialize the logging system.
///
/// Events always go to the daily operational log in `logs_dir`. With
/// `verbose`, debug output is mirrored to stderr.
pub fn init(logs_dir: impl Into<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(DailyLog::new(logs_dir));

    let stderr_layer = verbose.then(|| fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_daily_log_appends_to_dated_file() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("logs");
        let daily = DailyLog::new(&logs);

        daily.make_writer().write_all(b"first\n").unwrap();
        daily.make_writer().write_all(b"second\n").unwrap();

        let path = operational_log_path(&logs, Local::now().date_naive());
        assert_eq!(fs::read_to_string(path).unwrap(), "first\nsecond\n");
    }
}
