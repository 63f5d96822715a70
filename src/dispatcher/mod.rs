//! # Command dispatcher
//!
//! Parses one command line and routes it to the handler for its action keyword.
//!
//! ```text
//! SET <param> <value>   → SetHandler
//! GET <param>           → GetHandler
//! ALARM                 → AlarmHandler (fixed rules, callback, no registry)
//! STATUS                → GetHandler report + monitoring summary
//! MONITOR <sub-command> → MonitorCommands
//! ```
//!
//! Every outcome, failures included, is a response string. Nothing the dispatcher does
//! can fail the exchange that carried the command.

pub mod monitor;
pub mod radio;

use tracing::{debug, instrument};

use crate::monitoring::MonitorHandle;
use crate::radio::SharedRadio;

pub use monitor::{MonitorCommands, UNKNOWN_MONITOR_COMMAND};
pub use radio::{AlarmCallback, AlarmHandler, GetHandler, SetHandler};

pub const INVALID_COMMAND: &str = "ERROR: Invalid command format. Use: SET <param> <value>, GET <param>, ALARM, STATUS, or MONITOR <command>";

#[derive(Debug, Clone)]
pub struct Dispatcher {
    set: SetHandler,
    get: GetHandler,
    alarm: AlarmHandler,
    monitor: MonitorCommands,
}

impl Dispatcher {
    pub fn new(radio: SharedRadio, monitor: MonitorHandle, on_alarm: AlarmCallback) -> Self {
        Self {
            set: SetHandler::new(radio.clone()),
            get: GetHandler::new(radio.clone()),
            alarm: AlarmHandler::new(radio, on_alarm),
            monitor: MonitorCommands::new(monitor),
        }
    }

    #[instrument(skip(self))]
    pub fn execute(&self, line: &str) -> String {
        let words: Vec<&str> = line.split_whitespace().collect();

        let response = match words.as_slice() {
            ["SET", parameter, value, ..] => self.set.execute(parameter, value),
            ["GET", parameter, ..] => self.get.execute(parameter),
            ["ALARM", ..] => self.alarm.execute(),
            ["STATUS", ..] => format!("{}\n{}", self.get.status_report(), self.monitor.summary()),
            ["MONITOR", rest @ ..] => self.monitor.execute(rest),
            _ => INVALID_COMMAND.to_string(),
        };

        debug!(response_len = response.len(), "command executed");
        response
    }
}
