//! Process group termination with SIGKILL escalation

use crate::error::StopError;
use crate::process::liveness::{group_alive, is_running, to_pid};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, getpgrp, Pid};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Timing for a stop request
#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
    pub grace_period: Duration,
    pub kill_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(1),
            kill_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period after SIGTERM
    Graceful,
    /// Needed SIGKILL
    Killed,
    /// Gone before any signal landed
    AlreadyExited,
}

/// What a signal is addressed to
#[derive(Debug, Clone, Copy)]
enum Victim {
    Group(Pid),
    Single(Pid),
}

impl Victim {
    fn signal(&self, sig: Signal) -> nix::Result<()> {
        match *self {
            Victim::Group(pgid) => killpg(pgid, sig),
            Victim::Single(pid) => kill(pid, sig),
        }
    }

    fn alive(&self) -> bool {
        match *self {
            Victim::Group(pgid) => group_alive(pgid),
            Victim::Single(pid) => is_running(pid.as_raw() as u32),
        }
    }
}

/// Terminate the process group that owns `pid`.
///
/// Sends SIGTERM to the group and waits up to the grace period, then
/// SIGKILLs whatever is left and waits up to the kill timeout. Succeeds
/// only once the group is gone. `reap` runs before each liveness poll so
/// the caller can collect exit status of its own children, which would
/// otherwise linger as zombies and keep the group alive.
///
/// If `pid` shares the supervisor's own process group only `pid` itself
/// is signalled.
pub fn terminate_group(
    pid: u32,
    policy: &StopPolicy,
    mut reap: impl FnMut(),
) -> Result<StopOutcome, StopError> {
    let Some(target) = to_pid(pid) else {
        return Ok(StopOutcome::AlreadyExited);
    };

    let victim = match getpgid(Some(target)) {
        Ok(pgid) if pgid == getpgrp() => {
            warn!(pid, "process shares our process group, signalling it alone");
            Victim::Single(target)
        }
        Ok(pgid) => Victim::Group(pgid),
        Err(Errno::ESRCH) => return Ok(StopOutcome::AlreadyExited),
        Err(source) => return Err(StopError::Signal { pid, source }),
    };

    debug!(pid, ?victim, "sending SIGTERM");
    match victim.signal(Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(StopOutcome::AlreadyExited),
        Err(source) => return Err(StopError::Signal { pid, source }),
    }

    if wait_until_gone(&victim, policy.grace_period, policy.poll_interval, &mut reap) {
        return Ok(StopOutcome::Graceful);
    }

    warn!(
        pid,
        grace_ms = policy.grace_period.as_millis() as u64,
        "still alive after SIGTERM, sending SIGKILL"
    );
    match victim.signal(Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(source) => return Err(StopError::Signal { pid, source }),
    }

    if wait_until_gone(&victim, policy.kill_timeout, policy.poll_interval, &mut reap) {
        Ok(StopOutcome::Killed)
    } else {
        Err(StopError::StillAlive { pid })
    }
}

fn wait_until_gone(
    victim: &Victim,
    timeout: Duration,
    poll: Duration,
    reap: &mut impl FnMut(),
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        reap();
        if !victim.alive() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(poll);
    }
}
