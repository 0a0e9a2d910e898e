//! Process management for supervised dev servers

pub mod launcher;
pub mod liveness;
pub mod terminator;

pub use launcher::{launch, LaunchPlan};
pub use liveness::is_running;
pub use terminator::{terminate_group, StopOutcome, StopPolicy};
