//! Liveness checks for recorded pids and process groups

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg};
use nix::unistd::Pid;
use sysinfo::{ProcessStatus, System};

/// Convert a recorded pid to a `nix` pid, rejecting 0 and values that
/// would address a process group or overflow `pid_t`.
pub fn to_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// Check whether `pid` refers to a live process.
///
/// Sends signal 0. `EPERM` means the process exists but belongs to
/// someone else, which still counts as running. Zombies answer the
/// signal-0 check too, so they are filtered out with a process table lookup.
pub fn is_running(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };

    match kill(target, None) {
        Ok(()) | Err(Errno::EPERM) => !is_zombie(pid),
        Err(_) => false,
    }
}

/// Check whether any process remains in the group `pgid`.
///
/// When the group leads a session (how services are launched) members
/// left behind as zombies, waiting on a parent that never reaps, do not
/// count.
pub fn group_alive(pgid: Pid) -> bool {
    if !matches!(killpg(pgid, None), Ok(()) | Err(Errno::EPERM)) {
        return false;
    }

    let mut sys = System::new();
    sys.refresh_processes();

    let sid = sysinfo::Pid::from_u32(pgid.as_raw() as u32);
    let mut members = sys
        .processes()
        .values()
        .filter(|p| p.session_id() == Some(sid))
        .peekable();

    if members.peek().is_none() {
        return true;
    }
    members.any(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

fn is_zombie(pid: u32) -> bool {
    let pid = sysinfo::Pid::from_u32(pid);
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return false;
    }
    sys.process(pid)
        .map(|p| matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .unwrap_or(false)
}
