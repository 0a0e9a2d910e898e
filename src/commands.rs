//! Command dispatcher - sequences manager calls and reports results

use crate::error::DevError;
use crate::manager::ServiceManager;
use crate::process::StopOutcome;
use crate::service::{Service, Target};
use crate::ui;
use anyhow::Result;
use clap::Subcommand;
use std::fs;
use tokio::time::sleep;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start services
    Start {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// Stop services
    Stop {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// Restart services
    Restart {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// Show service status
    Status,
    /// Install dependencies
    Install {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// Show the latest log of a service
    Logs {
        #[arg(value_enum, default_value_t = Service::Backend)]
        service: Service,
    },
    /// Stop everything, remove build artifacts, old logs and the state file
    Clean,
    /// Show help
    Help,
    /// Anything else: reported, followed by help
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

/// Run one command to completion
pub async fn run(manager: &mut ServiceManager, command: Command) -> Result<()> {
    match command {
        Command::Start { target } => start(manager, target).await,
        Command::Stop { target } => stop(manager, target).await,
        Command::Restart { target } => restart(manager, target).await,
        Command::Status => status(manager),
        Command::Install { target } => {
            install(manager, target);
            Ok(())
        }
        Command::Logs { service } => logs(manager, service),
        Command::Clean => clean(manager).await,
        Command::Help => {
            help(manager);
            Ok(())
        }
        Command::Unknown(argv) => {
            let name = argv.first().map(String::as_str).unwrap_or_default();
            ui::error(format!("Unknown command: {name}"));
            help(manager);
            Ok(())
        }
    }
}

/// Report a per-service failure; only errors that make further work
/// meaningless (corrupt state, unexpected I/O) propagate.
fn report_failure(err: DevError) -> Result<()> {
    match err {
        DevError::AlreadyRunning { service, pid } => {
            ui::warning(format!("{} is already running (PID {pid})!", service.title()));
            Ok(())
        }
        DevError::NotRunning {
            service,
            stale_pid: None,
        } => {
            ui::warning(format!("{} is not running", service.title()));
            Ok(())
        }
        DevError::NotRunning {
            service,
            stale_pid: Some(pid),
        } => {
            ui::warning(format!(
                "{} process (PID {pid}) is not running, removed stale record",
                service.title()
            ));
            Ok(())
        }
        DevError::NoLogsFound { service } => {
            ui::warning(format!("No logs found for {service}"));
            Ok(())
        }
        err @ (DevError::Launch { .. } | DevError::Stop { .. } | DevError::Install { .. }) => {
            ui::error(capitalize(&err.to_string()));
            Ok(())
        }
        err => Err(err.into()),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub async fn start(manager: &mut ServiceManager, target: Target) -> Result<()> {
    ui::header("Starting Services");
    start_services(manager, target).await?;
    status(manager)
}

async fn start_services(manager: &mut ServiceManager, target: Target) -> Result<()> {
    for service in target.services() {
        ui::info(format!("Starting {service} server..."));
        match manager.start(service) {
            Ok(started) => {
                ui::success(format!("{} started with PID {}", service.title(), started.pid));
                ui::info(format!("Command: {}", started.command));
                ui::info(format!("Logs: {}", started.log_path.display()));
                // Warm-up only; gives no guarantee the service is ready
                sleep(manager.config().start_pause()).await;
            }
            Err(err) => report_failure(err)?,
        }
    }
    Ok(())
}

pub async fn stop(manager: &mut ServiceManager, target: Target) -> Result<()> {
    ui::header("Stopping Services");
    stop_services(manager, target)?;
    status(manager)
}

fn stop_services(manager: &mut ServiceManager, target: Target) -> Result<()> {
    for service in target.services() {
        ui::info(format!("Stopping {service}..."));
        match manager.stop(service) {
            Ok(StopOutcome::Killed) => ui::success(format!(
                "{} stopped (forced after {} ms grace period)",
                service.title(),
                manager.config().grace_period_ms
            )),
            Ok(_) => ui::success(format!("{} stopped", service.title())),
            Err(err) => report_failure(err)?,
        }
    }
    Ok(())
}

pub async fn restart(manager: &mut ServiceManager, target: Target) -> Result<()> {
    ui::header("Restarting Services");
    stop(manager, target).await?;
    sleep(manager.config().restart_pause()).await;
    start(manager, target).await
}

pub fn status(manager: &mut ServiceManager) -> Result<()> {
    ui::header("Service Status");

    let statuses = manager.status()?;

    for status in &statuses {
        match status.pid {
            Some(pid) => ui::success(format!("{}: Running (PID {pid})", status.service.title())),
            None => ui::error(format!("{}: Stopped", status.service.title())),
        }
    }

    for status in statuses.iter().filter(|s| s.is_running()) {
        ui::info(format!("{} URL: {}", status.service.title(), status.url));
    }

    Ok(())
}

/// Install failures are reported and never stop the sibling install
pub fn install(manager: &ServiceManager, target: Target) {
    ui::header("Installing Dependencies");

    for service in target.services() {
        ui::info(format!("Installing {service} dependencies..."));
        match manager.install(service) {
            Ok(()) => ui::success(format!("{} dependencies installed", service.title())),
            Err(err) => ui::error(capitalize(&err.to_string())),
        }
    }
}

pub fn logs(manager: &ServiceManager, service: Service) -> Result<()> {
    ui::header(&format!("{} Logs", service.title()));

    let path = match manager.latest_log(service) {
        Ok(path) => path,
        Err(err) => return report_failure(err),
    };

    ui::info(format!("Reading: {}", path.display()));
    ui::rule();

    match fs::read(&path) {
        Ok(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
        Err(e) => ui::error(format!("Failed to read log: {e}")),
    }

    Ok(())
}

pub async fn clean(manager: &mut ServiceManager) -> Result<()> {
    ui::header("Cleaning Build Files");

    stop(manager, Target::All).await?;

    for service in Service::all() {
        ui::info(format!("Cleaning {service}..."));
        for (path, result) in manager.clean_artifacts(service) {
            match result {
                Ok(()) => ui::info(format!("Removed {}", path.display())),
                Err(e) => ui::error(format!("Failed to remove {}: {e}", path.display())),
            }
        }
    }

    ui::info("Cleaning old logs...");
    match manager.prune_logs() {
        Ok(pruned) => {
            for (path, result) in pruned {
                let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
                match result {
                    Ok(()) => ui::info(format!("Removed {name}")),
                    Err(e) => ui::error(format!("Failed to remove {name}: {e}")),
                }
            }
        }
        Err(e) => ui::error(format!("Failed to clean old logs: {e}")),
    }

    if manager.delete_state()? {
        ui::info(format!("Removed {}", manager.state_path().display()));
    }

    ui::success("Cleanup completed");
    Ok(())
}

pub fn help(manager: &ServiceManager) {
    let config = manager.config();
    ui::help(
        &manager.logs_dir(),
        &config.url(Service::Backend),
        &config.url(Service::Frontend),
    );
}

/// Scoped shutdown after an interrupt: stop whatever this invocation
/// launched so a half-finished start does not leave orphans behind.
pub fn shutdown(manager: &mut ServiceManager) {
    for (service, result) in manager.shutdown_launched() {
        match result {
            Ok(_) => ui::info(format!("Stopped {service} launched by this run")),
            Err(err) => {
                let _ = report_failure(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_word_parses_as_unknown_command() {
        use clap::{FromArgMatches, Subcommand};

        let cmd = Command::augment_subcommands(
            clap::Command::new("devctl").disable_help_subcommand(true),
        );
        let matches = cmd.try_get_matches_from(["devctl", "deploy", "now"]).unwrap();
        assert_eq!(
            Command::from_arg_matches(&matches).unwrap(),
            Command::Unknown(vec!["deploy".to_string(), "now".to_string()])
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("failed to start"), "Failed to start");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_benign_failures_do_not_propagate() {
        assert!(report_failure(DevError::NotRunning {
            service: Service::Backend,
            stale_pid: Some(7),
        })
        .is_ok());
        assert!(report_failure(DevError::Install {
            service: Service::Frontend,
            reason: "exit 1".to_string(),
        })
        .is_ok());
        assert!(report_failure(DevError::Io(std::io::Error::other("disk"))).is_err());
    }
}
