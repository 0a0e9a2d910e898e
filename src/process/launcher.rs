//! Launching services as detached process groups

use crate::config::Config;
use crate::error::LaunchError;
use crate::service::Service;
use nix::unistd::setsid;
use std::fs::{self, File};
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Fully resolved argv and working directory for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl LaunchPlan {
    /// Resolve how `service` is started under `root`.
    ///
    /// Prefers the first configured package script present in
    /// `package.json`, then the configured fallback command.
    pub fn resolve(config: &Config, root: &Path, service: Service) -> Result<Self, LaunchError> {
        let svc = config.service(service);
        let cwd = root.join(&svc.dir);

        if !cwd.is_dir() {
            return Err(LaunchError::MissingDirectory(cwd));
        }

        let scripts = package_scripts(&cwd)?;
        let argv: Vec<String> = match svc.scripts.iter().find(|s| scripts.contains(*s)) {
            Some(script) => vec![
                config.package_manager.clone(),
                "run".to_string(),
                script.clone(),
            ],
            None => match &svc.command {
                Some(command) if !command.is_empty() => command.clone(),
                _ => {
                    return Err(LaunchError::NoStartScript {
                        dir: cwd,
                        scripts: svc.scripts.join(", "),
                    })
                }
            },
        };

        let (program, args) = argv
            .split_first()
            .map(|(p, a)| (p.clone(), a.to_vec()))
            .unwrap_or_default();
        let program = resolve_executable(&program, &cwd)?;

        Ok(Self { program, args, cwd })
    }

    /// Human-readable command line for log output
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Script names declared in `<dir>/package.json`. A missing manifest has none.
pub fn package_scripts(dir: &Path) -> Result<Vec<String>, LaunchError> {
    let path = dir.join("package.json");
    if !path.exists() {
        return Ok(Vec::new());
    }

    let manifest_err = |source: io::Error| LaunchError::Manifest {
        path: path.clone(),
        source,
    };

    let content = fs::read_to_string(&path).map_err(manifest_err)?;
    let manifest: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| manifest_err(e.into()))?;

    Ok(manifest
        .get("scripts")
        .and_then(|s| s.as_object())
        .map(|scripts| scripts.keys().cloned().collect())
        .unwrap_or_default())
}

/// Look `program` up on PATH, or relative to `cwd` when it contains a separator
pub fn resolve_executable(program: &str, cwd: &Path) -> Result<PathBuf, LaunchError> {
    which::which_in(program, std::env::var_os("PATH"), cwd).map_err(|source| {
        LaunchError::ExecutableNotFound {
            program: program.to_string(),
            source,
        }
    })
}

/// Create the capture file for one launch attempt, along with its directory
pub fn open_log(log_path: &Path) -> Result<File, LaunchError> {
    let log_err = |source: io::Error| LaunchError::LogFile {
        path: log_path.to_path_buf(),
        source,
    };

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(log_err)?;
    }
    File::create(log_path).map_err(log_err)
}

/// Spawn `plan` in a new session so its pid is also its process group id.
/// Combined stdout/stderr go to `log`.
pub fn launch(plan: &LaunchPlan, log: File) -> Result<Child, LaunchError> {
    let spawn_err = |source: io::Error| LaunchError::Spawn {
        program: plan.program.display().to_string(),
        source,
    };

    let stderr = log.try_clone().map_err(spawn_err)?;

    let mut cmd = Command::new(&plan.program);
    cmd.args(&plan.args)
        .current_dir(&plan.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));

    // SAFETY: setsid is async-signal-safe and touches no parent state
    unsafe {
        cmd.pre_exec(|| setsid().map(|_| ()).map_err(io::Error::from));
    }

    debug!(command = %plan.display(), cwd = %plan.cwd.display(), "spawning");

    cmd.spawn().map_err(spawn_err)
}
