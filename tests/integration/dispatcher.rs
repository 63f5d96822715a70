//! Commands driven end to end through a live serving cycle

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use radio_control::client::Client;
use radio_control::config::Config;
use radio_control::server::CycleOutcome;
use radio_control::transport::{ClientTransport, TransportError};

use crate::helpers::{exchange_all, spawn_server, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_set_and_get_through_the_mailbox() {
    let server = spawn_server("set_get", test_config());

    let responses = exchange_all(
        &server.names,
        &[
            "SET frequency 25.5",
            "GET frequency",
            "SET frequency 25.53",
            "GET frequency",
            "SET nominal_output_power 11",
            "SET temp 20",
            "GET bogus",
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        responses,
        vec![
            "SUCCESS: Parameter frequency set to 25.5",
            "SUCCESS: frequency = 25.500000",
            "ERROR: Failed to set frequency to 25.53",
            "SUCCESS: frequency = 25.500000",
            "ERROR: Failed to set nominal_output_power to 11",
            "ERROR: Failed to set temp to 20",
            "ERROR: Unknown parameter bogus",
        ]
    );

    assert_eq!(server.shutdown().await, CycleOutcome::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_modulation_follows_automatic_mode() {
    let server = spawn_server("modulation", test_config());

    let responses = exchange_all(
        &server.names,
        &[
            "GET modulation",
            "SET modulation on",
            "SET automatic_modulation off",
            "SET modulation on",
            "GET modulation",
        ],
    )
    .await
    .unwrap();

    assert_eq!(responses[0], "SUCCESS: modulation = auto");
    assert_eq!(responses[1], "ERROR: Failed to set modulation to on");
    assert_eq!(responses[2], "SUCCESS: Parameter automatic_modulation set to off");
    assert_eq!(responses[3], "SUCCESS: Parameter modulation set to on");
    assert_eq!(responses[4], "SUCCESS: modulation = on");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_and_alarm_commands() {
    let server = spawn_server("status", test_config());

    let responses = exchange_all(
        &server.names,
        &["STATUS", "ALARM", "ALARM", "FROB", "MONITOR STATUS"],
    )
    .await
    .unwrap();

    let status = &responses[0];
    assert!(status.starts_with("SYSTEM STATUS:\nNominal Power: 0.000000 dBm\nFrequency: 25.000000 MHz"));
    assert!(status.contains("\nAuto Modulation: on\nModulation: auto\n"));
    assert!(status.ends_with("Monitoring Service: ENABLED\nActive Alarms: 0\nSensor Updates: 0"));

    assert!(responses[1].starts_with("SUCCESS: Alarm check completed ("));
    assert!(responses[2].starts_with("SUCCESS: Alarm check completed ("));
    assert!(responses[3].starts_with("ERROR: Invalid command format"));

    // ALARM fires through its callback only; the monitoring registry stays empty
    let monitor_status = &responses[4];
    assert!(monitor_status.contains("\nTotal Alarms: 0\nActive Alarms: 0\n"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabled_service_freezes_readings() {
    let config = Config {
        polling_interval_ms: 10,
        ..test_config()
    };
    let server = spawn_server("service_off", config);

    let before = exchange_all(&server.names, &["MONITOR SERVICE off", "MONITOR SENSORS"])
        .await
        .unwrap();
    assert_eq!(before[0], "SUCCESS: Service state changed");

    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = exchange_all(&server.names, &["MONITOR SENSORS", "MONITOR STATUS"])
        .await
        .unwrap();
    assert_eq!(after[0], before[1]);
    assert!(after[1].contains("Service: DISABLED\n"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_monitor_config_round_trip() {
    let server = spawn_server("config", test_config());

    let responses = exchange_all(
        &server.names,
        &[
            "MONITOR CONFIG SET polling_interval_ms 250",
            "MONITOR CONFIG GET polling_interval_ms",
            "MONITOR CONFIG SET monitor_power false",
            "MONITOR CONFIG GET monitor_power",
            "MONITOR CONFIG GET nonsense",
            "MONITOR ALARM ACK 0",
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        responses,
        vec![
            "SUCCESS: Parameter set",
            "SUCCESS: polling_interval_ms = 250",
            "SUCCESS: Parameter set",
            "SUCCESS: monitor_power = false",
            "ERROR: Unknown parameter",
            "ERROR: Alarm not found",
        ]
    );

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_tracks_service_flag() {
    let server = spawn_server("snapshot", test_config());
    let names = server.names.clone();

    let snapshot = tokio::task::spawn_blocking(move || {
        let mut client = Client::connect(&names).unwrap();
        client.execute("MONITOR SERVICE off").unwrap();
        // The snapshot is republished on the next poll after the response
        std::thread::sleep(Duration::from_millis(50));
        client.snapshot()
    })
    .await
    .unwrap();

    assert!(!snapshot.service_enabled);
    assert_eq!(snapshot.active_alarms_count, 0);
    assert_eq!(snapshot.last_update.len(), "HH:MM:SS".len());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stopped_cycle_removes_resources() {
    let server = spawn_server("cleanup", test_config());
    let names = server.names.clone();

    exchange_all(&names, &["STATUS"]).await.unwrap();
    assert_eq!(server.shutdown().await, CycleOutcome::Stopped);

    assert_matches!(
        ClientTransport::open(&names),
        Err(TransportError::ServerNotRunning { .. })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_inactive_cycle_ends_idle() {
    let config = Config {
        inactivity_timeout_secs: 1,
        ..test_config()
    };
    let server = spawn_server("idle", config);

    let outcome = tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("cycle should end on its own")
        .unwrap()
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Idle);
}
