//! One-line PID file used for liveness checks and single-instance enforcement

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::error::DaemonError;

/// Check for a process with signal zero. A process we may not signal still exists.
pub fn is_alive(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// What the PID file currently says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidFileState {
    Missing,
    /// Names a process that is alive
    Live(Pid),
    /// Names a dead process, or holds something that is not a pid
    Stale,
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, source: io::Error) -> DaemonError {
        DaemonError::PidFile {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the recorded pid. Content that is not a positive integer reads as `None`.
    pub fn read(&self) -> Result<Option<Pid>, DaemonError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };

        match content.trim().parse::<i32>() {
            Ok(raw) if raw > 0 => Ok(Some(Pid::from_raw(raw))),
            _ => {
                warn!(path = %self.path.display(), "pid file holds no valid pid");
                Ok(None)
            }
        }
    }

    pub fn state(&self) -> Result<PidFileState, DaemonError> {
        if !self.path.exists() {
            return Ok(PidFileState::Missing);
        }
        Ok(match self.read()? {
            Some(pid) if is_alive(pid) => PidFileState::Live(pid),
            _ => PidFileState::Stale,
        })
    }

    /// Record `pid` in a file that must not exist yet.
    ///
    /// Creation is exclusive, so of two daemons racing past the preflight check only one
    /// gets to write; the other sees the winner's pid as already running.
    pub fn write(&self, pid: Pid) -> Result<(), DaemonError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(match self.read()? {
                    Some(owner) => DaemonError::AlreadyRunning(owner),
                    None => self.error(e),
                });
            }
            Err(e) => return Err(self.error(e)),
        };

        writeln!(file, "{pid}").map_err(|e| self.error(e))?;
        debug!(path = %self.path.display(), %pid, "pid file written");
        Ok(())
    }

    /// Delete the file. A file that is already gone is not an error.
    pub fn remove(&self) -> Result<(), DaemonError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "pid file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(e)),
        }
    }
}
