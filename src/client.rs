//! Client side of the radio control protocol: one-shot exchanges and the interactive session

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use crate::transport::{
    ClientTransport, MonitoringSnapshot, RESPONSE_TIMEOUT, ResourceNames, TransportError,
    TransportResult,
};

pub const HELP_TEXT: &str = "\
Commands:
  SET <param> <value>          set a radio parameter
  GET <param>                  read a radio parameter
  ALARM                        run the radio alarm check
  STATUS                       full system status
  MONITOR STATUS|SENSORS|ALARMS|UPDATE|CHECK|CLEAR
  MONITOR CONFIG GET <key>
  MONITOR CONFIG SET <key> <value>
  MONITOR ALARM ACK <id>
  MONITOR SERVICE on|off
  HELP                         show this help
  EXIT                         leave the session

Parameters: nominal_output_power (0..10), frequency (25.0..26.0, 0.1 steps),
automatic_modulation (on/off), modulation (on/off), temp, real_output_power, input_power";

pub struct Client {
    transport: ClientTransport,
    timeout: Duration,
}

impl Client {
    /// Attach to the running server. Fails with `ServerNotRunning` if it is absent.
    pub fn connect(names: &ResourceNames) -> TransportResult<Self> {
        Ok(Self {
            transport: ClientTransport::open(names)?,
            timeout: RESPONSE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one command and wait for its response.
    pub fn execute(&mut self, command: &str) -> TransportResult<String> {
        debug!(command, "sending command");
        self.transport.exchange(command, self.timeout)
    }

    pub fn snapshot(&self) -> MonitoringSnapshot {
        self.transport.snapshot()
    }
}

/// A line typed into the interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Help,
    Exit,
    Command(&'a str),
}

impl<'a> Input<'a> {
    pub fn classify(line: &'a str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            "HELP" | "help" => Input::Help,
            "EXIT" | "exit" | "quit" => Input::Exit,
            command => Input::Command(command),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Exit,
    EndOfInput,
    /// The server did not answer in time; the session is over
    Timeout,
}

/// Read commands from `input` until EXIT, end of input or a response timeout.
pub fn run_session<R: BufRead, W: Write>(
    client: &mut Client,
    input: R,
    mut output: W,
) -> anyhow::Result<SessionEnd> {
    writeln!(output, "Radio control client. Type HELP for commands, EXIT to quit.")?;

    let mut lines = input.lines();
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            return Ok(SessionEnd::EndOfInput);
        };
        let line = line.context("failed to read input")?;

        match Input::classify(&line) {
            Input::Empty => continue,
            Input::Help => writeln!(output, "{HELP_TEXT}")?,
            Input::Exit => return Ok(SessionEnd::Exit),
            Input::Command(command) => match client.execute(command) {
                Ok(response) => writeln!(output, "{response}")?,
                Err(TransportError::Timeout(after)) => {
                    warn!("server did not respond within {after:?}");
                    writeln!(output, "Error: server response timeout")?;
                    return Ok(SessionEnd::Timeout);
                }
                Err(e) => return Err(e).context("exchange with server failed"),
            },
        }
    }
}
