//! Service manager - lifecycle operations for the backend and frontend

use crate::config::Config;
use crate::error::{DevError, DevResult, LaunchError};
use crate::logs;
use crate::process::launcher::{open_log, resolve_executable};
use crate::process::{launch, liveness, terminate_group, LaunchPlan, StopOutcome, StopPolicy};
use crate::service::Service;
use crate::state::{self, StateStore};
use chrono::Local;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Result of a successful launch
#[derive(Debug, Clone)]
pub struct Started {
    pub pid: u32,
    pub log_path: PathBuf,
    pub command: String,
}

/// Snapshot of one service from a fresh liveness pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service: Service,
    /// Recorded pid, present only while it is alive
    pub pid: Option<u32>,
    pub url: String,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }
}

/// Owns the project layout and the child handles spawned by this invocation.
///
/// Persistent truth lives in the state file; `children` only exists so
/// processes we launched ourselves get reaped instead of lingering as
/// zombies that still answer liveness checks.
pub struct ServiceManager {
    config: Config,
    root: PathBuf,
    children: HashMap<Service, Child>,
}

impl ServiceManager {
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            children: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(&self.config.state_file)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(&self.config.logs_dir)
    }

    pub fn service_dir(&self, service: Service) -> PathBuf {
        self.root.join(&self.config.service(service).dir)
    }

    pub fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            grace_period: self.config.grace_period(),
            kill_timeout: self.config.kill_timeout(),
            poll_interval: self.config.poll_interval(),
        }
    }

    /// Services launched by this invocation, in start order
    pub fn launched(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.children.keys().copied().collect();
        services.sort();
        services
    }

    /// Collect the exit status of our own child for `service`, if any
    fn reap(&mut self, service: Service) {
        if let Some(child) = self.children.get_mut(&service) {
            if let Ok(Some(status)) = child.try_wait() {
                debug!(%service, pid = child.id(), %status, "reaped child");
                self.children.remove(&service);
            }
        }
    }

    fn alive(&mut self, service: Service, pid: u32) -> bool {
        self.reap(service);
        liveness::is_running(pid)
    }

    /// Start `service` unless its recorded pid is still alive.
    pub fn start(&mut self, service: Service) -> DevResult<Started> {
        let store = StateStore::load(self.state_path())?;
        if let Some(pid) = store.get(service) {
            if self.alive(service, pid) {
                return Err(DevError::AlreadyRunning { service, pid });
            }
        }

        let launch_err = |source: LaunchError| DevError::Launch { service, source };

        // Every attempt past the liveness check leaves a capture file, even
        // when the directory or executable turns out to be missing
        let log_path = logs::service_log_path(&self.logs_dir(), service, Local::now());
        let log = open_log(&log_path).map_err(launch_err)?;
        let plan = LaunchPlan::resolve(&self.config, &self.root, service).map_err(launch_err)?;
        let mut child = launch(&plan, log).map_err(launch_err)?;
        let pid = child.id();

        if let Err(source) = state::record(&self.state_path(), service, pid) {
            warn!(%service, pid, error = %source, "cannot record pid, stopping the new process");
            let result = terminate_group(pid, &self.stop_policy(), || {
                let _ = child.try_wait();
            });
            if let Err(e) = result {
                warn!(%service, pid, error = %e, "unrecorded process may still be running");
            }
            return Err(DevError::Untracked {
                service,
                pid,
                path: self.state_path(),
                source: Box::new(source),
            });
        }
        self.children.insert(service, child);

        info!(%service, pid, log = %log_path.display(), "started");
        Ok(Started {
            pid,
            log_path,
            command: plan.display(),
        })
    }

    /// Stop `service`'s process group and drop its record.
    ///
    /// A record whose process is already gone is removed and reported as
    /// `NotRunning` with the stale pid. Once a signal has been sent the
    /// record is removed even if the group could not be confirmed dead.
    pub fn stop(&mut self, service: Service) -> DevResult<StopOutcome> {
        let mut store = StateStore::load(self.state_path())?;
        let Some(pid) = store.get(service) else {
            return Err(DevError::NotRunning {
                service,
                stale_pid: None,
            });
        };

        if !self.alive(service, pid) {
            warn!(%service, pid, "removing stale record");
            store.remove(service);
            store.save()?;
            self.children.remove(&service);
            return Err(DevError::NotRunning {
                service,
                stale_pid: Some(pid),
            });
        }

        let policy = self.stop_policy();
        let mut child = self.children.remove(&service);
        let result = terminate_group(pid, &policy, || {
            if let Some(child) = child.as_mut() {
                let _ = child.try_wait();
            }
        });

        state::forget(&self.state_path(), service)?;

        match result {
            Ok(outcome) => {
                info!(%service, pid, ?outcome, "stopped");
                Ok(outcome)
            }
            Err(source) => Err(DevError::Stop { service, source }),
        }
    }

    /// Fresh liveness pass over both services. Never modifies state.
    pub fn status(&mut self) -> DevResult<Vec<ServiceStatus>> {
        let store = StateStore::load(self.state_path())?;

        let mut statuses = Vec::new();
        for service in Service::all() {
            let pid = store.get(service).filter(|&pid| self.alive(service, pid));
            statuses.push(ServiceStatus {
                service,
                pid,
                url: self.config.url(service),
            });
        }
        Ok(statuses)
    }

    /// Run `<package_manager> install` in the service directory with inherited stdio
    pub fn install(&self, service: Service) -> DevResult<()> {
        let dir = self.service_dir(service);
        let install_err = |reason: String| DevError::Install { service, reason };

        if !dir.is_dir() {
            return Err(install_err(format!("directory not found: {}", dir.display())));
        }

        let program = resolve_executable(&self.config.package_manager, &dir)
            .map_err(|e| install_err(e.to_string()))?;

        let status = Command::new(&program)
            .arg("install")
            .current_dir(&dir)
            .status()
            .map_err(|e| install_err(format!("failed to run {}: {e}", program.display())))?;

        if status.success() {
            Ok(())
        } else {
            Err(install_err(format!("{} install exited with {status}", self.config.package_manager)))
        }
    }

    /// Newest capture file for `service`
    pub fn latest_log(&self, service: Service) -> DevResult<PathBuf> {
        logs::latest_log(&self.logs_dir(), service).ok_or(DevError::NoLogsFound { service })
    }

    /// Remove the configured build artifact directories of `service`.
    /// Returns each existing directory with the outcome of removing it.
    pub fn clean_artifacts(&self, service: Service) -> Vec<(PathBuf, io::Result<()>)> {
        let dir = self.service_dir(service);
        self.config
            .service(service)
            .artifacts
            .iter()
            .map(|artifact| dir.join(artifact))
            .filter(|path| path.exists())
            .map(|path| {
                let result = fs::remove_dir_all(&path);
                (path, result)
            })
            .collect()
    }

    /// Delete logs older than the retention window, reporting each removal
    pub fn prune_logs(&self) -> DevResult<Vec<logs::Pruned>> {
        Ok(logs::prune_logs(
            &self.logs_dir(),
            self.config.log_retention(),
            SystemTime::now(),
        )?)
    }

    /// Delete the state file; returns whether one existed
    pub fn delete_state(&self) -> DevResult<bool> {
        StateStore::delete(&self.state_path())
    }

    /// Stop every service this invocation launched that is still tracked
    pub fn shutdown_launched(&mut self) -> Vec<(Service, DevResult<StopOutcome>)> {
        self.launched()
            .into_iter()
            .map(|service| (service, self.stop(service)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sleeper_project() -> (TempDir, ServiceManager) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        for service in Service::all() {
            fs::create_dir_all(temp.path().join(service.key())).unwrap();
        }
        config.backend.command = Some(vec!["sleep".into(), "30".into()]);
        config.frontend.command = Some(vec!["sleep".into(), "30".into()]);
        config.grace_period_ms = 500;
        config.poll_interval_ms = 20;
        let manager = ServiceManager::new(config, temp.path());
        (temp, manager)
    }

    #[test]
    #[serial]
    fn test_start_records_pid_and_stop_removes_it() {
        let (_temp, mut manager) = sleeper_project();

        let started = manager.start(Service::Backend).unwrap();
        assert!(liveness::is_running(started.pid));
        assert!(started.log_path.exists());
        assert_eq!(
            StateStore::load(manager.state_path()).unwrap().get(Service::Backend),
            Some(started.pid)
        );
        assert_eq!(manager.launched(), vec![Service::Backend]);

        let outcome = manager.stop(Service::Backend).unwrap();
        assert_eq!(outcome, StopOutcome::Graceful);
        assert!(!liveness::is_running(started.pid));
        assert_eq!(StateStore::load(manager.state_path()).unwrap().get(Service::Backend), None);
        assert!(manager.launched().is_empty());
    }

    #[test]
    #[serial]
    fn test_second_start_is_already_running() {
        let (_temp, mut manager) = sleeper_project();

        let first = manager.start(Service::Frontend).unwrap();
        let err = manager.start(Service::Frontend).unwrap_err();
        assert!(matches!(err, DevError::AlreadyRunning { pid, .. } if pid == first.pid));

        let store = StateStore::load(manager.state_path()).unwrap();
        assert_eq!(store.entries().count(), 1);

        manager.stop(Service::Frontend).unwrap();
    }

    #[test]
    fn test_stop_without_record_is_not_running() {
        let (_temp, mut manager) = sleeper_project();
        let err = manager.stop(Service::Backend).unwrap_err();
        assert!(matches!(err, DevError::NotRunning { stale_pid: None, .. }));
    }

    #[test]
    #[serial]
    fn test_stale_record_is_reaped_on_stop() {
        let (_temp, mut manager) = sleeper_project();
        let started = manager.start(Service::Backend).unwrap();

        // Kill it behind the manager's back
        nix::sys::signal::killpg(
            nix::unistd::Pid::from_raw(started.pid as i32),
            nix::sys::signal::Signal::SIGKILL,
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let statuses = manager.status().unwrap();
        assert!(!statuses[0].is_running());

        let err = manager.stop(Service::Backend).unwrap_err();
        assert!(matches!(err, DevError::NotRunning { stale_pid: Some(p), .. } if p == started.pid));
        assert!(StateStore::load(manager.state_path()).unwrap().is_empty());
    }

    #[test]
    fn test_start_with_missing_directory_writes_no_record() {
        let (temp, mut manager) = sleeper_project();
        fs::remove_dir_all(temp.path().join("frontend")).unwrap();

        let err = manager.start(Service::Frontend).unwrap_err();
        assert!(matches!(
            err,
            DevError::Launch {
                source: LaunchError::MissingDirectory(_),
                ..
            }
        ));
        assert!(!manager.state_path().exists());

        let log = manager.latest_log(Service::Frontend).expect("capture file created");
        assert_eq!(fs::read_to_string(log).unwrap(), "");
    }

    #[test]
    fn test_start_with_missing_executable_still_creates_log() {
        let (_temp, mut manager) = sleeper_project();
        manager.config.backend.command = Some(vec!["definitely-not-a-real-binary-xyz".into()]);

        let err = manager.start(Service::Backend).unwrap_err();
        assert!(matches!(
            err,
            DevError::Launch {
                source: LaunchError::ExecutableNotFound { .. },
                ..
            }
        ));
        assert!(manager.latest_log(Service::Backend).is_ok());
        assert!(!manager.state_path().exists());
    }

    #[test]
    #[serial]
    fn test_unrecordable_start_stops_the_new_process() {
        let (temp, mut manager) = sleeper_project();
        fs::write(temp.path().join("sub"), "a file, not a directory").unwrap();
        manager.config.state_file = PathBuf::from("sub/.pids.json");

        let err = manager.start(Service::Backend).unwrap_err();
        let DevError::Untracked { service, pid, path, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*service, Service::Backend);
        assert_eq!(*path, temp.path().join("sub/.pids.json"));
        assert!(err.to_string().contains("sub/.pids.json"));
        assert!(!liveness::is_running(*pid));
        assert!(manager.launched().is_empty());
    }

    #[test]
    fn test_corrupt_state_aborts_start() {
        let (_temp, mut manager) = sleeper_project();
        fs::write(manager.state_path(), "garbage").unwrap();

        let err = manager.start(Service::Backend).unwrap_err();
        assert!(matches!(err, DevError::CorruptState { .. }));
        assert_eq!(fs::read_to_string(manager.state_path()).unwrap(), "garbage");
        assert!(manager.launched().is_empty());
    }

    #[test]
    fn test_status_without_state_file() {
        let (_temp, mut manager) = sleeper_project();
        let statuses = manager.status().unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.is_running()));
        assert_eq!(statuses[1].url, "http://localhost:5173");
    }

    #[test]
    fn test_latest_log_reports_no_logs() {
        let (_temp, manager) = sleeper_project();
        assert!(matches!(
            manager.latest_log(Service::Frontend),
            Err(DevError::NoLogsFound { service: Service::Frontend })
        ));
    }

    #[test]
    fn test_clean_artifacts_removes_existing_dirs_only() {
        let (temp, manager) = sleeper_project();
        fs::create_dir_all(temp.path().join("frontend/node_modules/pkg")).unwrap();
        fs::create_dir_all(temp.path().join("frontend/build")).unwrap();

        let removed = manager.clean_artifacts(Service::Frontend);
        let paths: Vec<_> = removed.iter().map(|(p, _)| p.clone()).collect();

        assert_eq!(
            paths,
            vec![
                temp.path().join("frontend/node_modules"),
                temp.path().join("frontend/build"),
            ]
        );
        assert!(removed.iter().all(|(_, r)| r.is_ok()));
        assert!(!temp.path().join("frontend/node_modules").exists());
        assert!(temp.path().join("frontend").exists());
    }

    #[test]
    fn test_install_missing_directory() {
        let (temp, manager) = sleeper_project();
        fs::remove_dir_all(temp.path().join("backend")).unwrap();
        assert!(matches!(
            manager.install(Service::Backend),
            Err(DevError::Install { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_shutdown_launched_stops_only_own_children() {
        let (_temp, mut manager) = sleeper_project();
        let started = manager.start(Service::Backend).unwrap();

        let results = manager.shutdown_launched();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
        assert!(!liveness::is_running(started.pid));
    }
}
