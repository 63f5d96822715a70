//! # Daemon supervisor
//!
//! Lifecycle of the background radio server process.
//!
//! ```text
//! STOPPED ──start()──▶ STARTING ──detached, pid written──▶ RUNNING
//!    ▲                                                        │
//!    └────────── pid file removed ◀── STOPPING ◀──SIGTERM─────┘
//! ```
//!
//! ## Single instance
//!
//! The PID file is the only record of a running daemon. `start()` refuses while it names a
//! live process and silently replaces it when the process is gone. `status()` and `stop()`
//! clean up stale files as a side effect.
//!
//! ## Cancellation
//!
//! SIGTERM and SIGINT only flip the shared [`StopSignal`]; the supervised loop and the
//! current serving cycle observe it and wind down on their own.

pub mod error;
pub mod pidfile;
pub mod process;
pub mod stop;
pub mod supervisor;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use nix::unistd::{Pid, getpid};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::Config;
use crate::server::RadioServer;
use crate::transport::ResourceNames;

pub use error::DaemonError;
pub use pidfile::{PidFile, PidFileState, is_alive};
pub use process::{Detached, Termination};
pub use stop::{StopSignal, install_signal_handlers};
pub use supervisor::{SupervisorReport, supervise};

/// Identity attached to every log line of the daemon
pub const LOG_IDENT: &str = "radio_server";

/// How long the launcher waits for the detached daemon to record its pid
const PID_FILE_APPEAR_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonPhase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What the pre-start check found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    /// No PID file
    Clear,
    /// A PID file for a dead process was removed
    RemovedStale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Returned in the launcher once the daemon is detached
    Launched { pid: Option<Pid> },
    /// Returned in the daemon itself after its supervised loop ends
    Finished(SupervisorReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Running(Pid),
    NotRunning,
    /// A PID file named a dead process and was removed
    StaleRemoved,
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub struct Daemon {
    config: Config,
    names: ResourceNames,
    pid_file: PidFile,
}

impl Daemon {
    /// Paths are made absolute up front because the daemon changes directory to `/`.
    pub fn new(mut config: Config) -> Self {
        config.pid_file = absolute(&config.pid_file);
        config.stdout_log = absolute(&config.stdout_log);
        config.stderr_log = absolute(&config.stderr_log);

        Self {
            pid_file: PidFile::new(&config.pid_file),
            config,
            names: ResourceNames::default(),
        }
    }

    /// Serve on different IPC names than the well-known ones.
    pub fn with_resource_names(mut self, names: ResourceNames) -> Self {
        self.names = names;
        self
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    fn enter(&self, phase: DaemonPhase) {
        info!(ident = LOG_IDENT, ?phase, "daemon phase");
    }

    /// Enforce the single-instance rule without touching a live process.
    pub fn preflight(&self) -> Result<Preflight, DaemonError> {
        match self.pid_file.state()? {
            PidFileState::Missing => Ok(Preflight::Clear),
            PidFileState::Live(pid) => Err(DaemonError::AlreadyRunning(pid)),
            PidFileState::Stale => {
                info!(path = %self.pid_file.path().display(), "removing stale pid file");
                self.pid_file.remove()?;
                Ok(Preflight::RemovedStale)
            }
        }
    }

    /// Detach and run the supervised loop in the background.
    ///
    /// Returns twice, once in each process: [`StartOutcome::Launched`] in the caller and
    /// [`StartOutcome::Finished`] in the daemon when it stops. Must be called before any
    /// tokio runtime exists in this process.
    pub fn start(&self) -> Result<StartOutcome, DaemonError> {
        self.preflight()?;
        self.enter(DaemonPhase::Starting);

        if process::detach()? == Detached::Launcher {
            return Ok(StartOutcome::Launched {
                pid: self.wait_for_pid_file(),
            });
        }

        let pid = getpid();
        self.pid_file.write(pid)?;
        process::redirect_output(&self.config.stdout_log, &self.config.stderr_log)?;
        info!(%pid, "daemon started");

        let result = self.run_supervised();
        self.finish(pid);
        result.map(StartOutcome::Finished)
    }

    /// Run the supervised loop attached to the terminal, still recording the pid.
    pub fn run_foreground(&self) -> Result<SupervisorReport, DaemonError> {
        self.preflight()?;
        self.enter(DaemonPhase::Starting);

        let pid = getpid();
        self.pid_file.write(pid)?;
        let result = self.run_supervised();
        self.finish(pid);
        result
    }

    fn wait_for_pid_file(&self) -> Option<Pid> {
        let deadline = Instant::now() + PID_FILE_APPEAR_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(pid)) = self.pid_file.read() {
                return Some(pid);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        warn!("daemon did not record its pid in time");
        None
    }

    fn finish(&self, pid: Pid) {
        self.enter(DaemonPhase::Stopping);
        // A newer instance may have replaced the file after a forced takeover
        if matches!(self.pid_file.read(), Ok(Some(recorded)) if recorded == pid) {
            if let Err(e) = self.pid_file.remove() {
                warn!("failed to remove pid file: {e}");
            }
        }
        self.enter(DaemonPhase::Stopped);
    }

    fn run_supervised(&self) -> Result<SupervisorReport, DaemonError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        let span = info_span!("daemon", ident = LOG_IDENT);
        let report = runtime.block_on(
            async {
                let stop = StopSignal::new();
                let signals = install_signal_handlers(stop.clone())?;
                self.enter(DaemonPhase::Running);

                let config = &self.config;
                let names = &self.names;
                let report = supervise(&stop, config.restart_backoff(), || {
                    let config = config.clone();
                    let names = names.clone();
                    let stop = stop.clone();
                    async move { RadioServer::open(&config, &names)?.run(stop).await }
                })
                .await;

                signals.abort();
                anyhow::Ok(report)
            }
            .instrument(span),
        )?;

        debug!(?report, "runtime finished");
        Ok(report)
    }

    /// Ask the recorded daemon to stop, escalating to SIGKILL after the stop timeout.
    /// The PID file is removed whichever way the process ended.
    pub fn stop(&self) -> Result<Termination, DaemonError> {
        let Some(pid) = self.pid_file.read()? else {
            self.pid_file.remove()?;
            return Err(DaemonError::NotRunning);
        };

        if !is_alive(pid) {
            info!(%pid, "pid file is stale, removing");
            self.pid_file.remove()?;
            return Err(DaemonError::NotRunning);
        }

        info!(%pid, "stopping daemon");
        let result = process::terminate(pid, self.config.stop_timeout());
        self.pid_file.remove()?;
        result
    }

    /// Running iff the PID file names a live process. A stale file is removed.
    pub fn status(&self) -> Result<DaemonStatus, DaemonError> {
        match self.pid_file.state()? {
            PidFileState::Missing => Ok(DaemonStatus::NotRunning),
            PidFileState::Live(pid) => Ok(DaemonStatus::Running(pid)),
            PidFileState::Stale => {
                self.pid_file.remove()?;
                Ok(DaemonStatus::StaleRemoved)
            }
        }
    }
}
