//! Helper functions for integration tests

use std::sync::atomic::{AtomicUsize, Ordering};

use radio_control::client::Client;
use radio_control::config::Config;
use radio_control::daemon::StopSignal;
use radio_control::server::{CycleOutcome, RadioServer};
use radio_control::transport::{ResourceNames, TransportResult};
use tokio::task::JoinHandle;

/// IPC names no other test (or a real server) is using
pub fn unique_names(tag: &str) -> ResourceNames {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    ResourceNames::with_prefix(&format!("radio_it_{}_{tag}_{n}", std::process::id()))
}

/// Fast command polling and an engine that does not tick on its own during a test
pub fn test_config() -> Config {
    Config {
        command_poll_ms: 5,
        polling_interval_ms: 60_000,
        ..Config::default()
    }
}

pub struct RunningServer {
    pub names: ResourceNames,
    pub stop: StopSignal,
    pub task: JoinHandle<anyhow::Result<CycleOutcome>>,
}

impl RunningServer {
    pub async fn shutdown(self) -> CycleOutcome {
        self.stop.request_stop();
        self.task.await.unwrap().unwrap()
    }
}

/// Open a serving cycle on fresh names and run it in the background.
pub fn spawn_server(tag: &str, config: Config) -> RunningServer {
    let names = unique_names(tag);
    let server = RadioServer::open(&config, &names).unwrap();
    let stop = StopSignal::new();
    let task = tokio::spawn(server.run(stop.clone()));

    RunningServer { names, stop, task }
}

/// Run `commands` through one client session on a blocking thread.
pub async fn exchange_all(
    names: &ResourceNames,
    commands: &[&str],
) -> TransportResult<Vec<String>> {
    let names = names.clone();
    let commands: Vec<String> = commands.iter().map(|c| c.to_string()).collect();

    tokio::task::spawn_blocking(move || -> TransportResult<Vec<String>> {
        let mut client = Client::connect(&names)?;
        commands
            .iter()
            .map(|command| client.execute(command))
            .collect()
    })
    .await
    .unwrap()
}
