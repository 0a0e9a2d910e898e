//! Log file naming, lookup and retention

use crate::service::Service;
use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Path of the capture file for one start attempt, e.g. `backend_20240131_142501.log`
pub fn service_log_path(logs_dir: &Path, service: Service, at: DateTime<Local>) -> PathBuf {
    logs_dir.join(format!("{}_{}.log", service.key(), at.format("%Y%m%d_%H%M%S")))
}

/// Path of the supervisor's own log for a given day, e.g. `manage_20240131.log`
pub fn operational_log_path(logs_dir: &Path, day: NaiveDate) -> PathBuf {
    logs_dir.join(format!("manage_{}.log", day.format("%Y%m%d")))
}

/// Most recently modified capture file for `service`
pub fn latest_log(logs_dir: &Path, service: Service) -> Option<PathBuf> {
    let prefix = format!("{}_", service.key());

    fs::read_dir(logs_dir)
        .ok()?
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".log")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

/// Outcome of removing one expired log
pub type Pruned = (PathBuf, io::Result<()>);

/// Delete every `*.log` in `logs_dir` last modified more than `retention` before `now`.
/// Returns each expired path with the outcome of removing it; one failure
/// does not stop the rest. A missing directory removes nothing.
pub fn prune_logs(logs_dir: &Path, retention: Duration, now: SystemTime) -> io::Result<Vec<Pruned>> {
    let entries = match fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut expired: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("log"))
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|modified| now.duration_since(modified).unwrap_or_default() > retention)
                .unwrap_or(false)
        })
        .map(|entry| entry.path())
        .collect();
    expired.sort();

    Ok(expired
        .into_iter()
        .map(|path| {
            let result = fs::remove_file(&path);
            (path, result)
        })
        .collect())
}
