//! Owned child-process handles

use log::{debug, warn};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::error::{Error, Result};

/// Terminal state of a reaped child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Child called exit with the given code
    Exited(i32),
    /// Child was terminated by a signal
    Signaled(Signal),
}

impl ExitStatus {
    /// True only for a clean zero exit
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

/// Owned handle to a spawned child process
///
/// Consumed exactly once by [`ProcessHandle::wait`]; the consuming
/// signature makes a double reap unrepresentable. A handle dropped without
/// waiting performs a blocking reap in `Drop`, so no exit path leaves a
/// zombie behind. Drop the child's stream handle first when the child reads
/// from it, or that reap will block forever waiting for EOF.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
    reaped: bool,
}

impl ProcessHandle {
    pub(crate) fn new(pid: Pid) -> Self {
        debug!("tracking child process {}", pid);
        Self { pid, reaped: false }
    }

    /// Process identity of the child
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Block until the child terminates and collect its exit status
    pub fn wait(mut self) -> Result<ExitStatus> {
        self.reap()
    }

    /// Send a signal to the child
    pub(crate) fn kill(&self, signal: Signal) -> Result<()> {
        kill(self.pid, signal)
            .map_err(|e| Error::Execution(format!("kill({}) failed: {}", self.pid, e)))
    }

    pub(crate) fn reap(&mut self) -> Result<ExitStatus> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    self.reaped = true;
                    debug!("child {} exited with code {}", self.pid, code);
                    return Ok(ExitStatus::Exited(code));
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    self.reaped = true;
                    debug!("child {} killed by {}", self.pid, signal);
                    return Ok(ExitStatus::Signaled(signal));
                }
                // Stopped/continued states are not terminal
                Ok(_) => continue,
                Err(e) => {
                    return Err(Error::Execution(format!(
                        "waitpid({}) failed: {}",
                        self.pid, e
                    )))
                }
            }
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.reaped {
            warn!("child {} dropped without wait, reaping", self.pid);
            let _ = self.reap();
        }
    }
}
