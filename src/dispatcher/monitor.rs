//! The `MONITOR` sub-protocol
//!
//! ```text
//! MONITOR STATUS | SENSORS | ALARMS | UPDATE | CHECK | CLEAR
//! MONITOR CONFIG GET <key>
//! MONITOR CONFIG SET <key> <value>
//! MONITOR ALARM ACK <id>
//! MONITOR SERVICE on|off
//! ```

use std::fmt::Write;

use chrono::Local;
use tracing::debug;

use crate::monitoring::{Alarm, MonitorHandle, MonitorState, Sensor};
use crate::radio::params::parse_bool;
use crate::transport::RESPONSE_CAPACITY;

pub const UNKNOWN_MONITOR_COMMAND: &str = "ERROR: Unknown MONITOR command. Use: STATUS, SENSORS, ALARMS, CONFIG, ALARM ACK, SERVICE, UPDATE, CHECK, CLEAR";

/// A readable or writable CONFIG key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKey {
    ServiceEnabled,
    PollingInterval,
    Monitor(Sensor),
    Range(Sensor),
}

impl ConfigKey {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "service_enabled" => return Some(ConfigKey::ServiceEnabled),
            "polling_interval_ms" | "polling_interval" => return Some(ConfigKey::PollingInterval),
            _ => {}
        }

        if let Some(sensor) = key.strip_prefix("monitor_") {
            return sensor.parse().ok().map(ConfigKey::Monitor);
        }
        if let Some(sensor) = key.strip_suffix("_range") {
            return sensor.parse().ok().map(ConfigKey::Range);
        }
        None
    }
}

/// Room kept in the response for the overflow marker
const OVERFLOW_RESERVE: usize = 32;

fn alarm_entry(alarm: &Alarm) -> String {
    let mut entry = String::new();
    let _ = writeln!(entry, "ID: {}", alarm.id);
    let _ = writeln!(entry, "  Sensor: {}", alarm.sensor);
    let _ = writeln!(entry, "  Severity: {}", alarm.severity);
    let _ = writeln!(entry, "  Message: {}", alarm.message);
    let _ = writeln!(
        entry,
        "  Value: {:.2} (Threshold: {:.2})",
        alarm.value, alarm.threshold
    );
    let _ = writeln!(entry, "  Time: {}", alarm.timestamp.format("%H:%M:%S"));
    let _ = writeln!(
        entry,
        "  Acknowledged: {}",
        if alarm.acknowledged { "YES" } else { "NO" }
    );
    let _ = writeln!(entry, "  ------------------");
    entry
}

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}

/// Handler for `MONITOR ...` commands, bound to one monitoring engine
#[derive(Debug, Clone)]
pub struct MonitorCommands {
    monitor: MonitorHandle,
}

impl MonitorCommands {
    pub fn new(monitor: MonitorHandle) -> Self {
        Self { monitor }
    }

    fn state(&self) -> &MonitorState {
        self.monitor.state()
    }

    /// Execute the words following `MONITOR`.
    pub fn execute(&self, args: &[&str]) -> String {
        debug!(?args, "monitor command");

        match args {
            ["STATUS", ..] => self.status_report(),
            ["SENSORS", ..] => self.sensors_report(),
            ["ALARMS", ..] => self.alarms_report(),
            ["UPDATE", ..] => self.update(),
            ["CHECK", ..] => self.check(),
            ["CLEAR", ..] => self.clear(),
            ["CONFIG", "GET", rest @ ..] => self.config_get(rest.first().copied()),
            ["CONFIG", "SET", key, value @ ..] if !value.is_empty() => {
                if self.config_set(key, &value.join(" ")) {
                    "SUCCESS: Parameter set".to_string()
                } else {
                    "ERROR: Failed to set parameter".to_string()
                }
            }
            ["CONFIG", "SET", ..] => "ERROR: Failed to set parameter".to_string(),
            ["ALARM", "ACK", id, ..] => {
                let acknowledged = id
                    .parse::<u64>()
                    .is_ok_and(|id| self.state().registry().acknowledge(id));
                if acknowledged {
                    "SUCCESS: Alarm acknowledged".to_string()
                } else {
                    "ERROR: Alarm not found".to_string()
                }
            }
            ["ALARM", "ACK"] => "ERROR: Alarm not found".to_string(),
            ["SERVICE", state, ..] => match parse_bool(state) {
                Some(enabled) => {
                    self.state().set_service_enabled(enabled);
                    "SUCCESS: Service state changed".to_string()
                }
                None => "ERROR: Invalid state (use on/off)".to_string(),
            },
            ["SERVICE"] => "ERROR: Invalid state (use on/off)".to_string(),
            _ => UNKNOWN_MONITOR_COMMAND.to_string(),
        }
    }

    /// One-line summary appended to the top-level STATUS report
    pub fn summary(&self) -> String {
        let state = self.state();
        format!(
            "Monitoring Service: {}\nActive Alarms: {}\nSensor Updates: {}",
            if state.service_enabled() { "ENABLED" } else { "DISABLED" },
            state.registry().active_count(),
            state.total_updates()
        )
    }

    fn status_report(&self) -> String {
        let state = self.state();
        let since_update = (Local::now() - state.last_update()).num_seconds().max(0);

        let mut report = String::new();
        let _ = writeln!(report, "Monitoring System Status:");
        let _ = writeln!(report, "=======================");
        let _ = writeln!(
            report,
            "Service: {}",
            if state.service_enabled() { "ENABLED" } else { "DISABLED" }
        );
        let _ = writeln!(report, "Polling Interval: {} ms", state.polling_interval_ms());
        let _ = writeln!(report, "Last Update: {since_update} seconds ago");
        let _ = writeln!(report, "Total Updates: {}", state.total_updates());
        let _ = writeln!(report, "Total Alarms: {}", state.registry().total_triggered());
        let _ = writeln!(report, "Active Alarms: {}", state.registry().active_count());
        let _ = write!(report, "\nSensor Monitoring:");
        for channel in state.sensors().iter() {
            let _ = write!(
                report,
                "\n{}: {}",
                channel.sensor.label(),
                on_off(channel.is_monitored())
            );
        }
        report
    }

    fn sensors_report(&self) -> String {
        let mut report = String::from("Current Sensor Values:\n======================");
        for (i, channel) in self.state().sensors().iter().enumerate() {
            let sensor = channel.sensor;
            let _ = write!(
                report,
                "\n{}{}: {:.2} {}\n  Range: [{:.2}, {:.2}]\n  Monitoring: {}",
                if i == 0 { "" } else { "\n" },
                sensor.label(),
                channel.reading(),
                sensor.unit(),
                channel.spec.min,
                channel.spec.max,
                on_off(channel.is_monitored())
            );
        }
        report
    }

    fn alarms_report(&self) -> String {
        let alarms = self.state().registry().list_active();
        if alarms.is_empty() {
            return "No active alarms".to_string();
        }

        let limit = RESPONSE_CAPACITY - 1 - OVERFLOW_RESERVE;
        let mut report = format!("Active Alarms ({}):\n================\n", alarms.len());
        for (shown, alarm) in alarms.iter().enumerate() {
            let entry = alarm_entry(alarm);
            if report.len() + entry.len() > limit {
                let _ = write!(report, "... ({} more)", alarms.len() - shown);
                break;
            }
            report.push_str(&entry);
        }
        report
    }

    fn update(&self) -> String {
        let state = self.state();
        state.update_sensors(&mut rand::rng());

        let mut report = String::from("Sensors updated:");
        for channel in state.sensors().iter() {
            let _ = write!(
                report,
                "\n  {}: {:.2} {}",
                channel.sensor.label(),
                channel.reading(),
                channel.sensor.unit()
            );
        }
        report
    }

    fn check(&self) -> String {
        self.state().check_thresholds();
        format!(
            "Threshold check completed.\nActive alarms: {}",
            self.state().registry().active_count()
        )
    }

    fn clear(&self) -> String {
        self.state().registry().clear_acknowledged();
        format!(
            "Acknowledged alarms cleared. Remaining active alarms: {}",
            self.state().registry().active_count()
        )
    }

    fn config_get(&self, key: Option<&str>) -> String {
        let Some(key) = key else {
            return "ERROR: No parameter specified".to_string();
        };
        let Some(parsed) = ConfigKey::parse(key) else {
            return "ERROR: Unknown parameter".to_string();
        };

        let state = self.state();
        let value = match parsed {
            ConfigKey::ServiceEnabled => state.service_enabled().to_string(),
            ConfigKey::PollingInterval => state.polling_interval_ms().to_string(),
            ConfigKey::Monitor(sensor) => state.sensors().channel(sensor).is_monitored().to_string(),
            ConfigKey::Range(sensor) => {
                let spec = state.sensors().channel(sensor).spec;
                format!("{},{}", spec.min, spec.max)
            }
        };
        format!("SUCCESS: {key} = {value}")
    }

    fn config_set(&self, key: &str, value: &str) -> bool {
        let state = self.state();
        match ConfigKey::parse(key) {
            Some(ConfigKey::ServiceEnabled) => parse_bool(value)
                .map(|enabled| state.set_service_enabled(enabled))
                .is_some(),
            Some(ConfigKey::PollingInterval) => value
                .parse::<u64>()
                .is_ok_and(|interval_ms| self.monitor.set_polling_interval(interval_ms)),
            Some(ConfigKey::Monitor(sensor)) => parse_bool(value)
                .map(|monitor| state.sensors().channel(sensor).set_monitored(monitor))
                .is_some(),
            Some(ConfigKey::Range(_)) | None => false,
        }
    }
}
