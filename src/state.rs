//! State store - persisted mapping of service name to pid

use crate::error::{DevError, DevResult};
use crate::service::Service;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct StateData {
    pids: BTreeMap<Service, u32>,
}

/// Persistent `{"backend": <pid>, "frontend": <pid>}` record file.
///
/// Every operation is a whole-file read or write. There is no locking:
/// concurrent invocations race and the last writer wins.
#[derive(Debug)]
pub struct StateStore {
    data: StateData,
    path: PathBuf,
}

impl StateStore {
    /// Load state from `path`. A missing file is an empty store; a file
    /// that is not valid JSON is `CorruptState` and is left untouched.
    pub fn load(path: impl Into<PathBuf>) -> DevResult<Self> {
        let path = path.into();

        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|source| DevError::CorruptState {
                path: path.clone(),
                source,
            })?
        } else {
            StateData::default()
        };

        Ok(Self { data, path })
    }

    /// Write the whole mapping back to disk, creating parent directories.
    pub fn save(&self) -> DevResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.data).map_err(std::io::Error::from)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, service: Service) -> Option<u32> {
        self.data.pids.get(&service).copied()
    }

    /// Insert or overwrite the record for `service`
    pub fn insert(&mut self, service: Service, pid: u32) {
        self.data.pids.insert(service, pid);
    }

    pub fn remove(&mut self, service: Service) -> Option<u32> {
        self.data.pids.remove(&service)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Service, u32)> + '_ {
        self.data.pids.iter().map(|(s, p)| (*s, *p))
    }

    pub fn is_empty(&self) -> bool {
        self.data.pids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the state file. Missing files are fine.
    pub fn delete(path: &Path) -> DevResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read-modify-write of a single record
pub fn record(path: &Path, service: Service, pid: u32) -> DevResult<()> {
    let mut store = StateStore::load(path)?;
    store.insert(service, pid);
    store.save()
}

/// Read-modify-write removal of a single record
pub fn forget(path: &Path, service: Service) -> DevResult<Option<u32>> {
    let mut store = StateStore::load(path)?;
    let removed = store.remove(service);
    if removed.is_some() {
        store.save()?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::load(temp.path().join(".pids.json")).unwrap();
        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_format_matches_service_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".pids.json");

        let mut store = StateStore::load(&path).unwrap();
        store.insert(Service::Frontend, 222);
        store.insert(Service::Backend, 111);
        store.save().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"backend": 111, "frontend": 222}));
    }

    #[test]
    fn test_reads_hand_written_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".pids.json");
        fs::write(&path, r#"{"frontend": 4242}"#).unwrap();

        let store = StateStore::load(&path).unwrap();
        assert_eq!(store.get(Service::Frontend), Some(4242));
        assert_eq!(store.get(Service::Backend), None);
    }

    #[test]
    fn test_corrupt_file_is_reported_and_preserved() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".pids.json");
        fs::write(&path, "{not json").unwrap();

        let err = StateStore::load(&path).unwrap_err();
        assert!(matches!(err, DevError::CorruptState { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn test_unknown_service_key_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".pids.json");
        fs::write(&path, r#"{"database": 1}"#).unwrap();

        assert!(matches!(
            StateStore::load(&path),
            Err(DevError::CorruptState { .. })
        ));
    }

    #[test]
    fn test_save_of_load_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".pids.json");
        record(&path, Service::Backend, 10).unwrap();
        record(&path, Service::Frontend, 20).unwrap();

        let first = StateStore::load(&path).unwrap();
        first.save().unwrap();
        let second = StateStore::load(&path).unwrap();

        assert_eq!(first.data, second.data);
    }

    #[test]
    fn test_record_overwrites_and_forget_removes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join(".pids.json");

        record(&path, Service::Backend, 1).unwrap();
        record(&path, Service::Backend, 2).unwrap();
        let store = StateStore::load(&path).unwrap();
        assert_eq!(store.entries().collect::<Vec<_>>(), vec![(Service::Backend, 2)]);

        assert_eq!(forget(&path, Service::Backend).unwrap(), Some(2));
        assert_eq!(forget(&path, Service::Backend).unwrap(), None);
        assert!(StateStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_delete_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".pids.json");
        assert!(!StateStore::delete(&path).unwrap());
        fs::write(&path, "{}").unwrap();
        assert!(StateStore::delete(&path).unwrap());
    }
}
