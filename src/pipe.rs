//! Unidirectional pipe channel with owned ends

use std::os::fd::OwnedFd;

use log::debug;
use nix::unistd::pipe;

use crate::error::{Error, Result};

/// A kernel pipe: one read end, one write end, created atomically
///
/// Both ends are `OwnedFd`, so each descriptor is closed exactly once when
/// its owner drops it. A process that forwards data must release the end it
/// does not use; holding both ends open starves the reader of EOF.
#[derive(Debug)]
pub struct PipeChannel {
    read: OwnedFd,
    write: OwnedFd,
}

impl PipeChannel {
    /// Create a new pipe
    ///
    /// Fails only if the kernel cannot allocate the pipe (for example on
    /// descriptor-table exhaustion).
    pub fn new() -> Result<Self> {
        let (read, write) =
            pipe().map_err(|e| Error::Resource(format!("pipe creation failed: {}", e)))?;
        debug!("created pipe channel");
        Ok(Self { read, write })
    }

    /// Borrow the read end
    pub fn read_end(&self) -> &OwnedFd {
        &self.read
    }

    /// Borrow the write end
    pub fn write_end(&self) -> &OwnedFd {
        &self.write
    }

    /// Transfer ownership of both ends, (read, write)
    pub fn into_parts(self) -> (OwnedFd, OwnedFd) {
        (self.read, self.write)
    }
}
