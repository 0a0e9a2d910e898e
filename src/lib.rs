//! devctl library - supervisor for a local backend/frontend dev stack

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod logs;
pub mod manager;
pub mod process;
pub mod service;
pub mod state;
pub mod ui;

// Re-export commonly used types
pub use config::Config;
pub use error::{DevError, DevResult, LaunchError, StopError};
pub use manager::{ServiceManager, ServiceStatus, Started};
pub use service::{Service, Target};
pub use state::StateStore;
