//! Spawning one child with a single redirected standard stream

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};

use log::debug;
use nix::unistd::{dup2, execvp, fork, ForkResult};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::pipe::PipeChannel;
use crate::process::{ExitStatus, ProcessHandle};

/// Exit status a child reports when its target program never started
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Which standard stream of the child is redirected through the pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// Child's stdout feeds the returned stream
    ReadFromChild,
    /// The returned stream feeds the child's stdin
    WriteToChild,
}

/// Parent side of a spawned child: its pipe stream plus process handle
///
/// Reading or writing goes through the stream according to the spawn mode.
/// [`ChildPipe::wait`] closes the stream before reaping, which is what
/// delivers EOF to a `WriteToChild` child.
#[derive(Debug)]
pub struct ChildPipe {
    stream: File,
    handle: ProcessHandle,
}

impl ChildPipe {
    /// Process identity of the child
    pub fn pid(&self) -> nix::unistd::Pid {
        self.handle.pid()
    }

    /// Split into the raw stream and the process handle
    pub fn into_parts(self) -> (File, ProcessHandle) {
        (self.stream, self.handle)
    }

    /// Close the stream, then block until the child terminates
    pub fn wait(self) -> Result<ExitStatus> {
        let ChildPipe { stream, handle } = self;
        drop(stream);
        handle.wait()
    }
}

impl Read for ChildPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for ChildPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Spawn `command` with exactly one standard stream redirected through a pipe
///
/// With [`SpawnMode::ReadFromChild`] the child's stdout is replaced by the
/// pipe's write end and the read end is returned; with
/// [`SpawnMode::WriteToChild`] the child's stdin is replaced by the read end
/// and the write end is returned. The other standard streams are inherited.
///
/// The child execs the command with PATH lookup. If the exec cannot start
/// (program not found, permission denied) the child terminates immediately
/// with [`EXEC_FAILURE_STATUS`]; it never runs caller code. The caller must
/// eventually wait on the returned [`ChildPipe`]; this function does not.
///
/// On fork failure both pipe ends are closed before the error is returned.
pub fn spawn(command: &Command, mode: SpawnMode) -> Result<ChildPipe> {
    let argv = command.to_cstring_argv()?;
    let channel = PipeChannel::new()?;
    let (read_end, write_end) = channel.into_parts();

    debug!("spawning {} in {:?} mode", command, mode);
    // Both OwnedFd ends are still owned here, so an early return on fork
    // failure closes them.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let child_end = match mode {
                SpawnMode::ReadFromChild => {
                    drop(read_end);
                    redirect(&write_end, libc::STDOUT_FILENO);
                    write_end
                }
                SpawnMode::WriteToChild => {
                    drop(write_end);
                    redirect(&read_end, libc::STDIN_FILENO);
                    read_end
                }
            };
            drop(child_end);
            let _ = execvp(&argv[0], &argv);
            unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
        }
        Ok(ForkResult::Parent { child }) => {
            let handle = ProcessHandle::new(child);
            let parent_end = match mode {
                SpawnMode::ReadFromChild => {
                    drop(write_end);
                    read_end
                }
                SpawnMode::WriteToChild => {
                    drop(read_end);
                    write_end
                }
            };
            Ok(ChildPipe {
                stream: File::from(parent_end),
                handle,
            })
        }
        Err(e) => Err(Error::Spawn(format!("fork failed: {}", e))),
    }
}

/// Duplicate a pipe end onto a standard descriptor, in the child
fn redirect(fd: &OwnedFd, stdio: i32) {
    if dup2(fd.as_raw_fd(), stdio).is_err() {
        unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
    }
}
