use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

/// Daemon and server settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Config {
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Where the detached daemon's standard output goes
    #[serde(default = "default_stdout_log")]
    pub stdout_log: PathBuf,

    /// Where the detached daemon's standard error (and so its tracing output) goes
    #[serde(default = "default_stderr_log")]
    pub stderr_log: PathBuf,

    /// Pause between a serving cycle ending and the next one starting
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,

    /// How long `--stop` waits for a graceful exit before killing
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// A serving cycle without commands for this long ends
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,

    #[serde(default = "default_command_poll_ms")]
    pub command_poll_ms: u64,

    /// Initial period of the monitoring engine
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            stdout_log: default_stdout_log(),
            stderr_log: default_stderr_log(),
            restart_backoff_secs: default_restart_backoff_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            command_poll_ms: default_command_poll_ms(),
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

impl Config {
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn command_poll(&self) -> Duration {
        Duration::from_millis(self.command_poll_ms)
    }

    fn validate(self) -> anyhow::Result<Self> {
        anyhow::ensure!(
            self.polling_interval_ms > 0,
            "polling_interval_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.command_poll_ms > 0,
            "command_poll_ms must be greater than zero"
        );
        Ok(self)
    }
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/radio_server.pid")
}

fn default_stdout_log() -> PathBuf {
    PathBuf::from("/tmp/radio_server_stdout.log")
}

fn default_stderr_log() -> PathBuf {
    PathBuf::from("/tmp/radio_server_stderr.log")
}

fn default_restart_backoff_secs() -> u64 {
    5
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_inactivity_timeout_secs() -> u64 {
    90
}

fn default_command_poll_ms() -> u64 {
    100
}

fn default_polling_interval_ms() -> u64 {
    crate::monitoring::DEFAULT_POLLING_INTERVAL_MS
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str::<Config>(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?
        .validate()
        .inspect(|config| trace!("loaded config: {config:?}"))
}
