//! SET, GET and ALARM handlers over the shared radio state

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::radio::params::{self, Parameter};
use crate::radio::{RadioAlarm, SharedRadio, alarm};

/// Receives every alarm fired by the ALARM command
pub type AlarmCallback = Arc<dyn Fn(&RadioAlarm) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SetHandler {
    radio: SharedRadio,
}

impl SetHandler {
    pub fn new(radio: SharedRadio) -> Self {
        Self { radio }
    }

    /// Validate and apply. A successful write resimulates the read-only measurements.
    pub fn execute(&self, parameter: &str, value: &str) -> String {
        let mut state = self.radio.lock();
        match params::set_parameter(&mut state, parameter, value) {
            Ok(()) => {
                state.resimulate(&mut rand::rng());
                debug!(parameter, value, "parameter set");
                format!("SUCCESS: Parameter {parameter} set to {value}")
            }
            Err(e) => {
                debug!(parameter, value, "rejected SET: {e}");
                format!("ERROR: Failed to set {parameter} to {value}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetHandler {
    radio: SharedRadio,
}

impl GetHandler {
    pub fn new(radio: SharedRadio) -> Self {
        Self { radio }
    }

    pub fn execute(&self, parameter: &str) -> String {
        match params::get_parameter(&self.radio.lock(), parameter) {
            Ok(value) => format!("SUCCESS: {parameter} = {value}"),
            Err(_) => format!("ERROR: Unknown parameter {parameter}"),
        }
    }

    /// The radio section of the STATUS report
    pub fn status_report(&self) -> String {
        let state = self.radio.snapshot();
        let value = |parameter| params::render_parameter(&state, parameter);

        format!(
            "SYSTEM STATUS:\n\
             Nominal Power: {} dBm\n\
             Frequency: {} MHz\n\
             Auto Modulation: {}\n\
             Modulation: {}\n\
             Temperature: {} C\n\
             Real Power: {} dBm\n\
             Input Power: {} dBm",
            value(Parameter::NominalOutputPower),
            value(Parameter::Frequency),
            value(Parameter::AutomaticModulation),
            value(Parameter::Modulation),
            value(Parameter::Temp),
            value(Parameter::RealOutputPower),
            value(Parameter::InputPower),
        )
    }
}

#[derive(Clone)]
pub struct AlarmHandler {
    radio: SharedRadio,
    on_alarm: AlarmCallback,
}

impl fmt::Debug for AlarmHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmHandler")
            .field("radio", &self.radio)
            .finish_non_exhaustive()
    }
}

impl AlarmHandler {
    pub fn new(radio: SharedRadio, on_alarm: AlarmCallback) -> Self {
        Self { radio, on_alarm }
    }

    /// Resimulate, then run the fixed rules.
    pub fn execute(&self) -> String {
        self.radio.lock().resimulate(&mut rand::rng());
        self.check()
    }

    /// Run the fixed rules against the current measurements and hand each fired alarm to
    /// the callback. The monitoring registry is never touched.
    pub fn check(&self) -> String {
        let fired = alarm::evaluate(&self.radio.lock());

        for alarm in &fired {
            (self.on_alarm)(alarm);
        }

        format!("SUCCESS: Alarm check completed ({} alarms raised)", fired.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::radio::{AlarmLevel, RadioState};

    #[test]
    fn test_set_then_get() {
        let radio = SharedRadio::new(RadioState::default());
        let set = SetHandler::new(radio.clone());
        let get = GetHandler::new(radio);

        assert_eq!(
            set.execute("nominal_output_power", "7.5"),
            "SUCCESS: Parameter nominal_output_power set to 7.5"
        );
        assert_eq!(
            get.execute("nominal_output_power"),
            "SUCCESS: nominal_output_power = 7.500000"
        );
    }

    #[test]
    fn test_rejected_set_leaves_state() {
        let radio = SharedRadio::new(RadioState::default());
        let set = SetHandler::new(radio.clone());

        assert_eq!(
            set.execute("nominal_output_power", "11"),
            "ERROR: Failed to set nominal_output_power to 11"
        );
        assert_eq!(radio.snapshot(), RadioState::default());
    }

    #[test]
    fn test_get_unknown() {
        let get = GetHandler::new(SharedRadio::default());
        assert_eq!(get.execute("volume"), "ERROR: Unknown parameter volume");
    }

    #[test]
    fn test_status_report_lines() {
        let get = GetHandler::new(SharedRadio::new(RadioState::default()));
        let report = get.status_report();

        assert!(report.starts_with("SYSTEM STATUS:\nNominal Power: 0.000000 dBm\nFrequency: 25.000000 MHz\n"));
        assert!(report.contains("\nModulation: auto\n"));
        assert!(report.ends_with("Input Power: -15.000000 dBm"));
    }

    fn recording_handler(state: RadioState) -> (AlarmHandler, Arc<Mutex<Vec<RadioAlarm>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = AlarmHandler::new(
            SharedRadio::new(state),
            Arc::new(move |alarm: &RadioAlarm| sink.lock().unwrap().push(alarm.clone())),
        );
        (handler, seen)
    }

    #[test]
    fn test_alarm_check_reports_each_fired_rule() {
        let (handler, seen) = recording_handler(RadioState {
            temp: 85.0,
            real_output_power: 0.0,
            input_power: -35.0,
            ..RadioState::default()
        });

        assert_eq!(
            handler.check(),
            "SUCCESS: Alarm check completed (2 alarms raised)"
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                RadioAlarm {
                    level: AlarmLevel::Warning,
                    message: "temperature 85.0°C is >80°C".to_string(),
                },
                RadioAlarm {
                    level: AlarmLevel::Warning,
                    message: "input power -35.0 dBm is below -30 dBm".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_alarm_check_power_rules() {
        let (handler, seen) = recording_handler(RadioState {
            nominal_output_power: 0.0,
            temp: 25.0,
            real_output_power: 13.0,
            input_power: 2.0,
            ..RadioState::default()
        });

        assert_eq!(
            handler.check(),
            "SUCCESS: Alarm check completed (3 alarms raised)"
        );
        let levels: Vec<AlarmLevel> = seen.lock().unwrap().iter().map(|a| a.level).collect();
        assert_eq!(
            levels,
            vec![AlarmLevel::Warning, AlarmLevel::Error, AlarmLevel::Error]
        );
    }

    #[test]
    fn test_quiet_radio_raises_nothing() {
        let (handler, seen) = recording_handler(RadioState {
            temp: 25.0,
            real_output_power: 1.0,
            input_power: -10.0,
            ..RadioState::default()
        });

        assert_eq!(
            handler.check(),
            "SUCCESS: Alarm check completed (0 alarms raised)"
        );
        assert!(seen.lock().unwrap().is_empty());
    }
}
