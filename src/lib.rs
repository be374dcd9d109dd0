//! procbox: process pipeline and bounded-execution primitives for Linux
//!
//! Three orchestration primitives built on fork/pipe/waitpid, sharing one
//! resource discipline: every pipe end is an `OwnedFd` closed exactly once,
//! and every child process is reaped by exactly one wait.
//!
//! - [`spawn`]: run one child with a single redirected standard stream,
//!   popen-style.
//! - [`run_pipeline`]: chain N commands stdout-to-stdin through kernel
//!   pipes and collect every exit status.
//! - [`sandbox_run`]: run a unit of work in a child under a wall-clock
//!   deadline and classify the outcome as a [`Verdict`].
//!
//! # Example
//!
//! ```ignore
//! use procbox::{run_pipeline, sandbox_run, Command};
//!
//! let stages = [
//!     Command::new("cat").arg("/etc/hostname"),
//!     Command::new("tr").args(["a-z", "A-Z"]),
//! ];
//! let summary = run_pipeline(&stages)?;
//! println!("all stages ok: {}", summary.success());
//!
//! let verdict = sandbox_run(|| do_risky_thing(), 5, true)?;
//! ```

pub mod command;
pub mod error;
pub mod pipe;
pub mod pipeline;
pub mod process;
pub mod sandbox;
pub mod spawn;

pub use command::Command;
pub use error::{Error, Result};
pub use pipe::PipeChannel;
pub use pipeline::{run_pipeline, ExitSummary};
pub use process::{ExitStatus, ProcessHandle};
pub use sandbox::{sandbox_run, FailureReason, Verdict};
pub use spawn::{spawn, ChildPipe, SpawnMode, EXEC_FAILURE_STATUS};
