use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use radio_control::{
    config::{Config, read_config_file},
    daemon::{Daemon, DaemonError, DaemonStatus, StartOutcome, Termination},
    util::get_config_path,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Radio control server daemon
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["start", "stop", "status", "foreground"])
))]
struct Args {
    /// Start the server as a background daemon
    #[arg(long)]
    start: bool,

    /// Stop the running daemon
    #[arg(long)]
    stop: bool,

    /// Report whether the daemon is running
    #[arg(long)]
    status: bool,

    /// Run the supervised server loop in the foreground
    #[arg(long)]
    foreground: bool,

    /// Config file (defaults to $RADIO_SERVER_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("radio_control", LevelFilter::DEBUG),
        ("radio_server", LevelFilter::DEBUG),
        ("alarm", LevelFilter::WARN),
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

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    match args.config.clone().or_else(get_config_path) {
        Some(path) => read_config_file(path),
        None => Ok(Config::default()),
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let daemon = Daemon::new(load_config(args)?);

    if args.start {
        match daemon.start()? {
            StartOutcome::Launched { pid: Some(pid) } => {
                println!("Radio server started with PID: {pid}");
            }
            StartOutcome::Launched { pid: None } => println!("Radio server started"),
            StartOutcome::Finished(report) => {
                info!(cycles = report.cycles, faults = report.faults, "daemon exiting");
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.stop {
        return match daemon.stop() {
            Ok(Termination::Graceful) => {
                println!("Radio server stopped");
                Ok(ExitCode::SUCCESS)
            }
            Ok(Termination::Forced) => {
                println!("Radio server did not stop gracefully and was killed");
                Ok(ExitCode::SUCCESS)
            }
            Err(DaemonError::NotRunning) => {
                println!("Radio server is not running");
                Ok(ExitCode::FAILURE)
            }
            Err(e) => Err(e.into()),
        };
    }

    if args.status {
        return Ok(match daemon.status()? {
            DaemonStatus::Running(pid) => {
                println!("Radio server is running with PID: {pid}");
                ExitCode::SUCCESS
            }
            DaemonStatus::NotRunning => {
                println!("Radio server is not running");
                ExitCode::FAILURE
            }
            DaemonStatus::StaleRemoved => {
                println!("PID file existed but the process was not running (removed)");
                ExitCode::FAILURE
            }
        });
    }

    let report = daemon.run_foreground()?;
    info!(cycles = report.cycles, faults = report.faults, "server exiting");
    Ok(ExitCode::SUCCESS)
}
