//! Fixed alarm rules evaluated by the ALARM command
//!
//! These fire immediately through a callback and are never recorded in the monitoring
//! registry.

use std::fmt;

use super::state::RadioState;

const NOMINAL_DEVIATION_LIMIT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlarmLevel {
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlarmLevel::Warning => "WARNING",
            AlarmLevel::Error => "ERROR",
            AlarmLevel::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadioAlarm {
    pub level: AlarmLevel,
    pub message: String,
}

impl RadioAlarm {
    fn new(level: AlarmLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for RadioAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

fn temperature_alarm(temp: f64) -> Option<RadioAlarm> {
    let (level, bound) = match temp {
        t if t > 110.0 => (AlarmLevel::Critical, ">110°C"),
        t if t > 100.0 => (AlarmLevel::Error, ">100°C"),
        t if t > 80.0 => (AlarmLevel::Warning, ">80°C"),
        t if t < -40.0 => (AlarmLevel::Critical, "<-40°C"),
        t if t < -30.0 => (AlarmLevel::Error, "<-30°C"),
        t if t < -20.0 => (AlarmLevel::Warning, "<-20°C"),
        _ => return None,
    };
    Some(RadioAlarm::new(
        level,
        format!("temperature {temp:.1}°C is {bound}"),
    ))
}

/// Evaluate every rule against the current measurements, in a fixed order.
pub fn evaluate(state: &RadioState) -> Vec<RadioAlarm> {
    let mut alarms = Vec::new();

    alarms.extend(temperature_alarm(state.temp));

    let deviation = (state.real_output_power - state.nominal_output_power).abs();
    if deviation > NOMINAL_DEVIATION_LIMIT {
        alarms.push(RadioAlarm::new(
            AlarmLevel::Warning,
            format!("output power deviates {deviation:.1} dB from nominal"),
        ));
    }

    if state.real_output_power < -2.0 || state.real_output_power > 12.0 {
        alarms.push(RadioAlarm::new(
            AlarmLevel::Error,
            format!(
                "output power {:.1} dBm outside [-2, 12] dBm",
                state.real_output_power
            ),
        ));
    }

    if state.input_power < -30.0 {
        alarms.push(RadioAlarm::new(
            AlarmLevel::Warning,
            format!("input power {:.1} dBm is below -30 dBm", state.input_power),
        ));
    } else if state.input_power > 0.0 {
        alarms.push(RadioAlarm::new(
            AlarmLevel::Error,
            format!("input power {:.1} dBm is above 0 dBm", state.input_power),
        ));
    }

    alarms
}
