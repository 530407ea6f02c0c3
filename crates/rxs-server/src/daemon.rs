//! Double-fork daemonization and the `--pid` readiness notification.

use nix::sys::signal::{self, Signal};
use nix::unistd::{ForkResult, Pid, fork, setsid};

use crate::error::ServerError;

/// Detach from the controlling terminal via the standard double-fork dance:
/// fork, have the first child `setsid`, fork again, and let only the
/// grandchild continue. Both intermediate parents exit immediately.
///
/// # Safety
///
/// Must be called before any threads are spawned (Tokio runtime included):
/// `fork` in a multi-threaded process only duplicates the calling thread,
/// leaving the child in an inconsistent state if other threads held locks.
#[allow(unsafe_code)]
pub fn daemonize() -> Result<(), ServerError> {
    match unsafe { fork() }.map_err(|e| ServerError::Daemonize(e.to_string()))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {},
    }

    setsid().map_err(|e| ServerError::Daemonize(e.to_string()))?;

    match unsafe { fork() }.map_err(|e| ServerError::Daemonize(e.to_string()))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {},
    }

    Ok(())
}

/// Notify `pid` that the server is ready to accept connections by sending
/// it `SIGUSR1`.
pub fn notify_ready(pid: i32) -> Result<(), ServerError> {
    signal::kill(Pid::from_raw(pid), Signal::SIGUSR1)
        .map_err(|e| ServerError::Daemonize(format!("failed to signal pid {pid}: {e}")))
}
