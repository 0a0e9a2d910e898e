use crate::error::DevError;
use crate::service::Service;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logs_dir: PathBuf,
    pub state_file: PathBuf,

    // Termination
    pub grace_period_ms: u64,
    pub kill_timeout_ms: u64,
    pub poll_interval_ms: u64,

    // Warm-up pauses
    pub start_pause_ms: u64,
    pub restart_pause_ms: u64,

    pub log_retention_days: u64,
    pub package_manager: String,

    #[serde(deserialize_with = "backend_table")]
    pub backend: ServiceConfig,
    #[serde(deserialize_with = "frontend_table")]
    pub frontend: ServiceConfig,
}

/// How one service is located, started and cleaned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub dir: PathBuf,
    pub scripts: Vec<String>,
    pub port: u16,
    pub artifacts: Vec<PathBuf>,
    /// Explicit argv used when no package script matches
    pub command: Option<Vec<String>>,
}

impl ServiceConfig {
    pub fn backend() -> Self {
        Self {
            dir: PathBuf::from("backend"),
            scripts: default_scripts(),
            port: 5000,
            artifacts: vec![PathBuf::from("node_modules"), PathBuf::from("dist")],
            command: None,
        }
    }

    pub fn frontend() -> Self {
        Self {
            dir: PathBuf::from("frontend"),
            scripts: default_scripts(),
            port: 5173,
            artifacts: vec![
                PathBuf::from("node_modules"),
                PathBuf::from("dist"),
                PathBuf::from("build"),
            ],
            command: None,
        }
    }
}

/// A `[backend]`/`[frontend]` table as written; unset keys keep the
/// service's own defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceTable {
    dir: Option<PathBuf>,
    scripts: Option<Vec<String>>,
    port: Option<u16>,
    artifacts: Option<Vec<PathBuf>>,
    command: Option<Vec<String>>,
}

impl ServiceTable {
    fn over(self, base: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            dir: self.dir.unwrap_or(base.dir),
            scripts: self.scripts.unwrap_or(base.scripts),
            port: self.port.unwrap_or(base.port),
            artifacts: self.artifacts.unwrap_or(base.artifacts),
            command: self.command.or(base.command),
        }
    }
}

fn backend_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ServiceConfig, D::Error> {
    Ok(ServiceTable::deserialize(deserializer)?.over(ServiceConfig::backend()))
}

fn frontend_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ServiceConfig, D::Error> {
    Ok(ServiceTable::deserialize(deserializer)?.over(ServiceConfig::frontend()))
}

fn default_scripts() -> Vec<String> {
    vec!["dev".to_string(), "start".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            state_file: PathBuf::from(".pids.json"),
            grace_period_ms: 1000,
            kill_timeout_ms: 1000,
            poll_interval_ms: 50,
            start_pause_ms: 2000,
            restart_pause_ms: 1000,
            log_retention_days: 3,
            package_manager: "npm".to_string(),
            backend: ServiceConfig::backend(),
            frontend: ServiceConfig::frontend(),
        }
    }
}

impl Config {
    /// Load config for a project root.
    ///
    /// An explicit path must exist. Otherwise the first of
    /// `<root>/devctl.toml` and `~/.config/devctl/config.toml` that exists
    /// is used, falling back to defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, DevError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let paths = [
            Some(root.join("devctl.toml")),
            dirs::config_dir().map(|p| p.join("devctl/config.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, DevError> {
        let content = std::fs::read_to_string(path).map_err(|e| DevError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| DevError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn service(&self, service: Service) -> &ServiceConfig {
        match service {
            Service::Backend => &self.backend,
            Service::Frontend => &self.frontend,
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn start_pause(&self) -> Duration {
        Duration::from_millis(self.start_pause_ms)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }

    pub fn log_retention(&self) -> Duration {
        Duration::from_secs(self.log_retention_days * 86_400)
    }

    pub fn url(&self, service: Service) -> String {
        format!("http://localhost:{}", self.service(service).port)
    }
}
