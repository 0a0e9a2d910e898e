//! Error taxonomy for supervisor operations

use crate::service::Service;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while spawning a service
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("working directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("no start script ({scripts}) in {} and no fallback command configured", dir.display())]
    NoStartScript { dir: PathBuf, scripts: String },

    #[error("executable `{program}` not found: {source}")]
    ExecutableNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Failure while terminating a service's process group
#[derive(Debug, Error)]
pub enum StopError {
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    /// The group led by `pid` (or `pid` alone, when it shares our group)
    /// outlived the kill timeout
    #[error("pid {pid} still alive after SIGKILL")]
    StillAlive { pid: u32 },
}

/// Top-level error for a service operation
#[derive(Debug, Error)]
pub enum DevError {
    #[error("{service} is already running (PID {pid})")]
    AlreadyRunning { service: Service, pid: u32 },

    /// `stale_pid` is set when a record existed but its process was gone
    #[error("{service} is not running")]
    NotRunning {
        service: Service,
        stale_pid: Option<u32>,
    },

    #[error("failed to start {service}: {source}")]
    Launch {
        service: Service,
        #[source]
        source: LaunchError,
    },

    /// The process was launched but its pid could not be persisted, so it
    /// was terminated again
    #[error("{service} (PID {pid}) could not be recorded in {}: {source}", path.display())]
    Untracked {
        service: Service,
        pid: u32,
        path: PathBuf,
        #[source]
        source: Box<DevError>,
    },

    #[error("failed to stop {service}: {source}")]
    Stop {
        service: Service,
        #[source]
        source: StopError,
    },

    #[error("failed to install {service} dependencies: {reason}")]
    Install { service: Service, reason: String },

    #[error("corrupt state file {}: {source}", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no logs found for {service}")]
    NoLogsFound { service: Service },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DevError {
    /// Outcomes that are reported but do not fail a command
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            DevError::AlreadyRunning { .. }
                | DevError::NotRunning { .. }
                | DevError::NoLogsFound { .. }
        )
    }
}

pub type DevResult<T> = std::result::Result<T, DevError>;
