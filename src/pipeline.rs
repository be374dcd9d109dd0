//! Pipeline executor: N commands chained stdout-to-stdin

use std::os::fd::{AsRawFd, OwnedFd};

use log::debug;
use nix::unistd::{dup2, execvp, fork, ForkResult};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::pipe::PipeChannel;
use crate::process::{ExitStatus, ProcessHandle};
use crate::spawn::EXEC_FAILURE_STATUS;

/// Per-stage exit statuses of a completed pipeline
#[derive(Debug, Default)]
pub struct ExitSummary {
    statuses: Vec<ExitStatus>,
}

impl ExitSummary {
    /// True when every stage exited with status zero
    ///
    /// An empty pipeline ran no stages and counts as success.
    pub fn success(&self) -> bool {
        self.statuses.iter().all(ExitStatus::success)
    }

    /// Number of stages that ran
    pub fn stage_count(&self) -> usize {
        self.statuses.len()
    }

    /// Exit status per stage, in pipeline order
    pub fn statuses(&self) -> &[ExitStatus] {
        &self.statuses
    }
}

/// Run `stages` as a shell-style pipeline and reap every stage
///
/// Stage *i*'s stdout is connected to stage *i+1*'s stdin through a kernel
/// pipe; the first stage's stdin and the last stage's stdout are inherited
/// from the caller. All stages run concurrently; the parent never touches
/// the data, it only launches and reaps. An empty slice is an immediate
/// success with no processes started.
///
/// If launching any stage fails, the remaining stages are not started, all
/// descriptors created so far are closed, every stage already started is
/// still reaped, and the call fails with [`Error::Pipeline`].
pub fn run_pipeline(stages: &[Command]) -> Result<ExitSummary> {
    let mut handles: Vec<ProcessHandle> = Vec::with_capacity(stages.len());
    let mut prev_read: Option<OwnedFd> = None;
    let mut launch_error: Option<Error> = None;

    for (i, command) in stages.iter().enumerate() {
        match launch_stage(command, i, i == stages.len() - 1, &mut prev_read) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                launch_error = Some(e.at_stage(i));
                break;
            }
        }
    }

    // The parent's copy of the last inter-stage read end must close before
    // reaping, or a stage blocked reading it would never see EOF.
    drop(prev_read);

    debug!("reaping {} pipeline stage(s)", handles.len());
    let mut statuses = Vec::with_capacity(handles.len());
    let mut wait_error: Option<Error> = None;
    for handle in handles {
        match handle.wait() {
            Ok(status) => statuses.push(status),
            Err(e) => wait_error = Some(e),
        }
    }

    if let Some(e) = launch_error {
        return Err(e);
    }
    if let Some(e) = wait_error {
        return Err(e);
    }
    Ok(ExitSummary { statuses })
}

/// Fork one stage, wiring its stdin/stdout as the pipeline demands
///
/// On return the parent owns the new inter-stage read end in `prev_read`
/// (for a non-final stage) and has closed everything else.
fn launch_stage(
    command: &Command,
    index: usize,
    is_last: bool,
    prev_read: &mut Option<OwnedFd>,
) -> Result<ProcessHandle> {
    let argv = command.to_cstring_argv()?;
    let channel = if is_last { None } else { Some(PipeChannel::new()?) };

    debug!("launching pipeline stage {}: {}", index, command);
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            if let Some(read_end) = prev_read.take() {
                if dup2(read_end.as_raw_fd(), libc::STDIN_FILENO).is_err() {
                    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
                }
                drop(read_end);
            }
            if let Some(channel) = channel {
                let (read_end, write_end) = channel.into_parts();
                drop(read_end);
                if dup2(write_end.as_raw_fd(), libc::STDOUT_FILENO).is_err() {
                    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
                }
                drop(write_end);
            }
            let _ = execvp(&argv[0], &argv);
            unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
        }
        Ok(ForkResult::Parent { child }) => {
            // The previous read end lives on only in the child now
            *prev_read = None;
            if let Some(channel) = channel {
                let (read_end, write_end) = channel.into_parts();
                drop(write_end);
                *prev_read = Some(read_end);
            }
            Ok(ProcessHandle::new(child))
        }
        Err(e) => Err(Error::Spawn(format!("fork failed: {}", e))),
    }
}
