//! Process-level operations: double-fork detachment, output redirection and termination

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::stat::{Mode, umask};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, chdir, dup2, fork, setsid};
use tracing::{debug, warn};

use super::error::DaemonError;
use super::pidfile::is_alive;

const DEATH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Which side of the detachment the caller ended up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// The original process; the daemon is running on its own
    Launcher,
    /// The detached daemon process
    Daemon,
}

/// Fork, become a session leader, fork again.
///
/// The intermediate process exits as soon as the daemon exists, and the launcher reaps it,
/// so a failure in the intermediate steps is reported to the launcher through its exit
/// status. Must be called before any runtime threads are started.
pub fn detach() -> Result<Detached, DaemonError> {
    let detach_error = |stage| move |source| DaemonError::Detach { stage, source };

    match unsafe { fork() }.map_err(detach_error("first fork"))? {
        ForkResult::Parent { child } => {
            return match waitpid(child, None).map_err(detach_error("reaping intermediate"))? {
                WaitStatus::Exited(_, 0) => Ok(Detached::Launcher),
                status => {
                    warn!(?status, "intermediate process failed");
                    Err(DaemonError::Detach {
                        stage: "intermediate process",
                        source: Errno::ECHILD,
                    })
                }
            };
        }
        ForkResult::Child => {}
    }

    if setsid().is_err() {
        std::process::exit(1);
    }

    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(_) => std::process::exit(1),
    }

    umask(Mode::from_bits_truncate(0o022));
    chdir("/").map_err(detach_error("chdir"))?;
    Ok(Detached::Daemon)
}

fn open_log(stream: &'static str, path: &Path) -> Result<File, DaemonError> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| DaemonError::Redirect {
            stream,
            path: path.to_path_buf(),
            source,
        })
}

/// Point stdin at /dev/null and stdout/stderr at fresh per-run log files.
pub fn redirect_output(stdout_log: &Path, stderr_log: &Path) -> Result<(), DaemonError> {
    let null = File::open("/dev/null").map_err(|source| DaemonError::Redirect {
        stream: "stdin",
        path: "/dev/null".into(),
        source,
    })?;
    let stdout = open_log("stdout", stdout_log)?;
    let stderr = open_log("stderr", stderr_log)?;

    for (file, target, stream, path) in [
        (&null, libc::STDIN_FILENO, "stdin", Path::new("/dev/null")),
        (&stdout, libc::STDOUT_FILENO, "stdout", stdout_log),
        (&stderr, libc::STDERR_FILENO, "stderr", stderr_log),
    ] {
        dup2(file.as_raw_fd(), target).map_err(|errno| DaemonError::Redirect {
            stream,
            path: path.to_path_buf(),
            source: errno.into(),
        })?;
    }
    Ok(())
}

/// How a termination request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited after SIGTERM
    Graceful,
    /// The process outlived the timeout and was sent SIGKILL
    Forced,
}

/// Send SIGTERM, wait up to `timeout` for the process to die, then SIGKILL it.
pub fn terminate(pid: Pid, timeout: Duration) -> Result<Termination, DaemonError> {
    match kill(pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(Termination::Graceful),
        Err(source) => return Err(DaemonError::Signal { pid, source }),
    }
    debug!(%pid, "SIGTERM sent");

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return Ok(Termination::Graceful);
        }
        std::thread::sleep(DEATH_POLL_INTERVAL);
    }

    if !is_alive(pid) {
        return Ok(Termination::Graceful);
    }

    warn!(%pid, "process survived SIGTERM, sending SIGKILL");
    match kill(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(Termination::Forced),
        Err(source) => Err(DaemonError::Signal { pid, source }),
    }
}
