//! PID file lifecycle, stop escalation and the restart loop against real processes

use std::process::Command;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use nix::unistd::{Pid, getpid};
use radio_control::config::Config;
use radio_control::daemon::{
    Daemon, DaemonError, DaemonStatus, Preflight, StopSignal, Termination, supervise,
};
use radio_control::server::RadioServer;
use radio_control::transport::{ClientTransport, TransportError};
use tempfile::TempDir;

use crate::helpers::{exchange_all, test_config, unique_names};

fn daemon_in(dir: &TempDir, config: Config) -> Daemon {
    Daemon::new(Config {
        pid_file: dir.path().join("radio_server.pid"),
        ..config
    })
}

/// Pid of a process that has exited and been reaped
fn dead_pid() -> Pid {
    let mut child = Command::new("true").spawn().unwrap();
    child.wait().unwrap();
    Pid::from_raw(child.id() as i32)
}

/// Start `command` and reap it on a background thread so it never lingers as a zombie.
fn spawn_reaped(command: &mut Command) -> Pid {
    let mut child = command.spawn().unwrap();
    let pid = Pid::from_raw(child.id() as i32);
    thread::spawn(move || child.wait());
    pid
}

#[test]
fn test_preflight_refuses_live_instance() {
    let dir = TempDir::new().unwrap();
    let daemon = daemon_in(&dir, test_config());
    daemon.pid_file().write(getpid()).unwrap();

    assert_matches!(daemon.preflight(), Err(DaemonError::AlreadyRunning(pid)) if pid == getpid());
    assert_eq!(daemon.pid_file().read().unwrap(), Some(getpid()));
}

#[test]
fn test_preflight_removes_stale_pid_file() {
    let dir = TempDir::new().unwrap();
    let daemon = daemon_in(&dir, test_config());
    daemon.pid_file().write(dead_pid()).unwrap();

    assert_eq!(daemon.preflight().unwrap(), Preflight::RemovedStale);
    assert!(!daemon.pid_file().path().exists());
    assert_eq!(daemon.preflight().unwrap(), Preflight::Clear);
}

#[test]
fn test_status_reports() {
    let dir = TempDir::new().unwrap();
    let daemon = daemon_in(&dir, test_config());

    assert_eq!(daemon.status().unwrap(), DaemonStatus::NotRunning);

    daemon.pid_file().write(getpid()).unwrap();
    assert_eq!(daemon.status().unwrap(), DaemonStatus::Running(getpid()));

    daemon.pid_file().remove().unwrap();
    daemon.pid_file().write(dead_pid()).unwrap();
    assert_eq!(daemon.status().unwrap(), DaemonStatus::StaleRemoved);
    assert_eq!(daemon.status().unwrap(), DaemonStatus::NotRunning);
}

#[test]
fn test_racing_daemons_cannot_both_record_a_pid() {
    let dir = TempDir::new().unwrap();
    let first = daemon_in(&dir, test_config());
    let second = daemon_in(&dir, test_config());

    // Both pass the check before either has written
    assert_eq!(first.preflight().unwrap(), Preflight::Clear);
    assert_eq!(second.preflight().unwrap(), Preflight::Clear);

    first.pid_file().write(getpid()).unwrap();
    let sleeper = spawn_reaped(Command::new("sleep").arg("30"));
    assert_matches!(
        second.pid_file().write(sleeper),
        Err(DaemonError::AlreadyRunning(pid)) if pid == getpid()
    );
    assert_eq!(first.pid_file().read().unwrap(), Some(getpid()));

    nix::sys::signal::kill(sleeper, nix::sys::signal::Signal::SIGKILL).unwrap();
}

#[test]
fn test_stop_without_pid_file() {
    let dir = TempDir::new().unwrap();
    let daemon = daemon_in(&dir, test_config());

    assert_matches!(daemon.stop(), Err(DaemonError::NotRunning));
}

#[test]
fn test_stop_terminates_gracefully() {
    let dir = TempDir::new().unwrap();
    let daemon = daemon_in(&dir, test_config());
    let pid = spawn_reaped(Command::new("sleep").arg("30"));
    daemon.pid_file().write(pid).unwrap();

    assert_eq!(daemon.stop().unwrap(), Termination::Graceful);
    assert!(!daemon.pid_file().path().exists());
}

#[test]
fn test_stop_escalates_when_term_is_ignored() {
    let dir = TempDir::new().unwrap();
    let daemon = daemon_in(
        &dir,
        Config {
            stop_timeout_secs: 1,
            ..test_config()
        },
    );
    let pid = spawn_reaped(Command::new("sh").args(["-c", "trap '' TERM; exec sleep 30"]));
    daemon.pid_file().write(pid).unwrap();
    // Let the shell install its trap before the first signal arrives
    thread::sleep(Duration::from_millis(200));

    assert_eq!(daemon.stop().unwrap(), Termination::Forced);
    assert!(!daemon.pid_file().path().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_supervised_server_answers_then_cleans_up() {
    let names = unique_names("supervised");
    let config = test_config();
    let stop = StopSignal::new();

    let supervisor = tokio::spawn({
        let names = names.clone();
        let stop = stop.clone();
        async move {
            supervise(&stop, Duration::from_millis(50), || {
                let config = config.clone();
                let names = names.clone();
                let stop = stop.clone();
                async move { RadioServer::open(&config, &names)?.run(stop).await }
            })
            .await
        }
    });

    // The first cycle creates the resources shortly after the supervisor starts
    let mut responses = None;
    for _ in 0..50 {
        match exchange_all(&names, &["GET nominal_output_power"]).await {
            Ok(r) => {
                responses = Some(r);
                break;
            }
            Err(TransportError::ServerNotRunning { .. }) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(e) => panic!("unexpected transport error: {e}"),
        }
    }
    assert_eq!(
        responses.expect("server never came up"),
        vec!["SUCCESS: nominal_output_power = 0.000000"]
    );

    stop.request_stop();
    let report = supervisor.await.unwrap();
    assert_eq!(report.cycles, 1);
    assert_eq!(report.faults, 0);

    assert_matches!(
        ClientTransport::open(&names),
        Err(TransportError::ServerNotRunning { .. })
    );
}
