//! Rendezvous tests over real POSIX shared memory and named semaphores

use std::thread;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use radio_control::transport::{
    COMMAND_CAPACITY, ClientTransport, ServerTransport, TransportError,
};

use crate::helpers::unique_names;

const SHORT: Duration = Duration::from_millis(200);

#[test]
fn test_client_before_server_fails_fast() {
    let names = unique_names("no_server");

    let started = Instant::now();
    let result = ClientTransport::open(&names);

    assert_matches!(result, Err(TransportError::ServerNotRunning { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_exchange_across_threads() {
    let names = unique_names("echo");
    let mut server = ServerTransport::open(&names).unwrap();

    let server_thread = thread::spawn(move || {
        let mut served = 0;
        let deadline = Instant::now() + Duration::from_secs(5);
        while served < 3 && Instant::now() < deadline {
            if let Some(pending) = server.try_receive().unwrap() {
                let response = format!("echo: {}", pending.command());
                pending.respond(&response).unwrap();
                served += 1;
            } else {
                thread::sleep(Duration::from_millis(2));
            }
        }
        served
    });

    let mut client = ClientTransport::open(&names).unwrap();
    for command in ["GET frequency", "STATUS", "ALARM"] {
        let response = client.exchange(command, Duration::from_secs(2)).unwrap();
        assert_eq!(response, format!("echo: {command}"));
    }

    assert_eq!(server_thread.join().unwrap(), 3);
}

#[test]
fn test_timeout_then_later_client_gets_its_own_answer() {
    let names = unique_names("timeout");
    let mut server = ServerTransport::open(&names).unwrap();

    let mut first = ClientTransport::open(&names).unwrap();
    let result = first.exchange("GET frequency", SHORT);
    assert_matches!(result, Err(TransportError::Timeout(_)));
    drop(first);

    // The server catches up on the abandoned command
    let pending = server.try_receive().unwrap().expect("abandoned command");
    assert_eq!(pending.command(), "GET frequency");
    pending.respond("stale answer").unwrap();

    let mut second = ClientTransport::open(&names).unwrap();
    second.send("STATUS").unwrap();

    let pending = server.try_receive().unwrap().expect("new command");
    assert_eq!(pending.command(), "STATUS");
    pending.respond("fresh answer").unwrap();

    assert_eq!(second.await_response(SHORT).unwrap(), "fresh answer");
    assert!(server.try_receive().unwrap().is_none());
}

#[test]
fn test_superseded_signal_is_not_answered_twice() {
    let names = unique_names("superseded");
    let mut server = ServerTransport::open(&names).unwrap();
    let mut client = ClientTransport::open(&names).unwrap();

    assert_matches!(
        client.exchange("GET temp", SHORT),
        Err(TransportError::Timeout(_))
    );

    // A second command overwrites the first before the server looks
    client.send("GET frequency").unwrap();

    let pending = server.try_receive().unwrap().expect("latest command");
    assert_eq!(pending.command(), "GET frequency");
    pending.respond("SUCCESS: frequency = 25.000000").unwrap();

    // The first signal now refers to an answered request and is dropped
    assert!(server.try_receive().unwrap().is_none());

    assert_eq!(
        client.await_response(SHORT).unwrap(),
        "SUCCESS: frequency = 25.000000"
    );
    assert_matches!(
        client.await_response(SHORT),
        Err(TransportError::Timeout(_))
    );
}

#[test]
fn test_overlong_command_is_truncated() {
    let names = unique_names("truncate");
    let mut server = ServerTransport::open(&names).unwrap();
    let mut client = ClientTransport::open(&names).unwrap();

    let command = "X".repeat(COMMAND_CAPACITY * 2);
    client.send(&command).unwrap();

    let pending = server.try_receive().unwrap().unwrap();
    assert_eq!(pending.command().len(), COMMAND_CAPACITY - 1);
    pending.respond("ok").unwrap();
    assert_eq!(client.await_response(SHORT).unwrap(), "ok");
}

#[test]
fn test_restarted_server_starts_with_drained_signals() {
    let names = unique_names("restart");

    let first_server = ServerTransport::open(&names).unwrap();
    let mut client = ClientTransport::open(&names).unwrap();
    client.send("STATUS").unwrap();
    drop(first_server);
    drop(client);

    let mut second_server = ServerTransport::open(&names).unwrap();
    assert!(second_server.try_receive().unwrap().is_none());

    let mut client = ClientTransport::open(&names).unwrap();
    client.send("GET modulation").unwrap();
    let pending = second_server.try_receive().unwrap().unwrap();
    assert_eq!(pending.command(), "GET modulation");
}
