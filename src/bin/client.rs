use std::io;
use std::process::ExitCode;

use clap::Parser;
use radio_control::{
    client::{Client, SessionEnd, run_session},
    transport::ResourceNames,
};
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Interactive client for the radio control server
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
struct Args {
    /// Run a single command, print the response and exit
    #[arg(short, long)]
    command: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("radio_control", LevelFilter::WARN),
        ("radio_client", LevelFilter::WARN),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut client = match Client::connect(&ResourceNames::default()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(command) = args.command {
        return match client.execute(&command) {
            Ok(response) => {
                println!("{response}");
                if response.starts_with("ERROR:") {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run_session(&mut client, io::stdin().lock(), io::stdout()) {
        Ok(SessionEnd::Timeout) => ExitCode::FAILURE,
        Ok(SessionEnd::Exit | SessionEnd::EndOfInput) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
