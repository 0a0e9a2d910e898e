//! The two managed services and command targets

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the managed dev servers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Backend,
    Frontend,
}

impl Service {
    /// All services in start order (backend first)
    pub fn all() -> [Service; 2] {
        [Service::Backend, Service::Frontend]
    }

    /// Lowercase key used in the state file and log file names
    pub fn key(&self) -> &'static str {
        match self {
            Service::Backend => "backend",
            Service::Frontend => "frontend",
        }
    }

    /// Capitalized name for user-facing messages
    pub fn title(&self) -> &'static str {
        match self {
            Service::Backend => "Backend",
            Service::Frontend => "Frontend",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which services a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Target {
    Backend,
    Frontend,
    #[default]
    All,
}

impl Target {
    /// Services matched by this target, backend before frontend
    pub fn services(&self) -> Vec<Service> {
        match self {
            Target::Backend => vec![Service::Backend],
            Target::Frontend => vec![Service::Frontend],
            Target::All => Service::all().to_vec(),
        }
    }
}

impl From<Service> for Target {
    fn from(service: Service) -> Self {
        match service {
            Service::Backend => Target::Backend,
            Service::Frontend => Target::Frontend,
        }
    }
}
