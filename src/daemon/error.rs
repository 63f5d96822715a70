use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("server is already running (pid {0})")]
    AlreadyRunning(Pid),

    #[error("server is not running")]
    NotRunning,

    #[error("pid file {path} error: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: Pid,
        #[source]
        source: Errno,
    },

    #[error("failed to detach from the terminal ({stage}): {source}")]
    Detach {
        stage: &'static str,
        #[source]
        source: Errno,
    },

    #[error("failed to redirect {stream} to {path}: {source}")]
    Redirect {
        stream: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("supervised loop failed: {0:#}")]
    Supervisor(#[from] anyhow::Error),
}
