//! Client sessions against a live serving cycle

use std::io::Cursor;
use std::time::Duration;

use pretty_assertions::assert_eq;
use radio_control::client::{Client, SessionEnd, run_session};
use radio_control::config::Config;

use crate::helpers::{exchange_all, spawn_server, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_session_ends_and_server_keeps_serving() {
    // The cycle only looks at the mailbox every two seconds
    let server = spawn_server(
        "session_timeout",
        Config {
            command_poll_ms: 2_000,
            ..test_config()
        },
    );
    let names = server.names.clone();
    // Let the immediate first poll pass so the next one is two seconds away
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (end, output) = tokio::task::spawn_blocking(move || {
        let mut client = Client::connect(&names)
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        let input = Cursor::new("GET frequency\nSTATUS\nEXIT\n");
        let mut output = Vec::new();
        let end = run_session(&mut client, input, &mut output).unwrap();
        (end, String::from_utf8(output).unwrap())
    })
    .await
    .unwrap();

    assert_eq!(end, SessionEnd::Timeout);
    assert_eq!(
        output,
        "Radio control client. Type HELP for commands, EXIT to quit.\n\
         > Error: server response timeout\n"
    );

    // A later, independent client is answered with its own command
    let responses = exchange_all(&server.names, &["GET frequency"]).await.unwrap();
    assert_eq!(responses, vec!["SUCCESS: frequency = 25.000000"]);

    assert!(!server.task.is_finished());
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_runs_commands_until_exit() {
    let server = spawn_server("session_exit", test_config());
    let names = server.names.clone();

    let (end, output) = tokio::task::spawn_blocking(move || {
        let mut client = Client::connect(&names).unwrap();
        let input = Cursor::new("\nGET frequency\nEXIT\nGET temp\n");
        let mut output = Vec::new();
        let end = run_session(&mut client, input, &mut output).unwrap();
        (end, String::from_utf8(output).unwrap())
    })
    .await
    .unwrap();

    assert_eq!(end, SessionEnd::Exit);
    assert_eq!(
        output,
        "Radio control client. Type HELP for commands, EXIT to quit.\n\
         > > SUCCESS: frequency = 25.000000\n\
         > "
    );

    server.shutdown().await;
}
