//! Validation and get/set of the radio parameters
//!
//! Everything here is a pure function over [`RadioState`]; locking and resimulation are
//! left to the command handlers.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

use super::state::RadioState;

pub const NOMINAL_OUTPUT_POWER_RANGE: RangeInclusive<f64> = 0.0..=10.0;
pub const FREQUENCY_RANGE: RangeInclusive<f64> = 25.0..=26.0;

const FREQUENCY_GRID_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    NominalOutputPower,
    Frequency,
    AutomaticModulation,
    Modulation,
    Temp,
    RealOutputPower,
    InputPower,
}

impl Parameter {
    /// Order in which STATUS lists the parameters
    pub const ALL: [Parameter; 7] = [
        Parameter::NominalOutputPower,
        Parameter::Frequency,
        Parameter::AutomaticModulation,
        Parameter::Modulation,
        Parameter::Temp,
        Parameter::RealOutputPower,
        Parameter::InputPower,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::NominalOutputPower => "nominal_output_power",
            Parameter::Frequency => "frequency",
            Parameter::AutomaticModulation => "automatic_modulation",
            Parameter::Modulation => "modulation",
            Parameter::Temp => "temp",
            Parameter::RealOutputPower => "real_output_power",
            Parameter::InputPower => "input_power",
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Parameter::NominalOutputPower
                | Parameter::Frequency
                | Parameter::AutomaticModulation
                | Parameter::Modulation
        )
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or(ParamError::UnknownParameter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("unknown parameter")]
    UnknownParameter,
    #[error("parameter is read-only")]
    ReadOnly,
    #[error("malformed value")]
    Malformed,
    #[error("value out of range")]
    OutOfRange,
    #[error("frequency is not on the 0.1 MHz grid")]
    OffGrid,
    #[error("modulation is locked while automatic modulation is on")]
    ModulationLocked,
}

/// Optional sign, then digits with at most one decimal point and at least one digit.
pub fn is_valid_number(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);

    let mut digits = 0;
    let mut dots = 0;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }

    digits > 0 && dots <= 1
}

pub fn parse_number(s: &str) -> Option<f64> {
    if !is_valid_number(s) {
        return None;
    }
    s.parse().ok()
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

pub fn is_on_frequency_grid(frequency: f64) -> bool {
    let scaled = frequency * 10.0;
    (scaled - scaled.round()).abs() < FREQUENCY_GRID_TOLERANCE
}

pub fn validate_nominal_output_power(value: &str) -> Result<f64, ParamError> {
    let power = parse_number(value).ok_or(ParamError::Malformed)?;
    if !NOMINAL_OUTPUT_POWER_RANGE.contains(&power) {
        return Err(ParamError::OutOfRange);
    }
    Ok(power)
}

pub fn validate_frequency(value: &str) -> Result<f64, ParamError> {
    let frequency = parse_number(value).ok_or(ParamError::Malformed)?;
    if !FREQUENCY_RANGE.contains(&frequency) {
        return Err(ParamError::OutOfRange);
    }
    if !is_on_frequency_grid(frequency) {
        return Err(ParamError::OffGrid);
    }
    Ok(frequency)
}

/// Apply a SET to the state. On error the state is left untouched.
pub fn set_parameter(state: &mut RadioState, name: &str, value: &str) -> Result<(), ParamError> {
    let parameter: Parameter = name.parse()?;

    match parameter {
        Parameter::NominalOutputPower => {
            state.nominal_output_power = validate_nominal_output_power(value)?;
        }
        Parameter::Frequency => {
            state.frequency = validate_frequency(value)?;
        }
        Parameter::AutomaticModulation => {
            state.automatic_modulation = parse_bool(value).ok_or(ParamError::Malformed)?;
        }
        Parameter::Modulation => {
            if state.automatic_modulation {
                return Err(ParamError::ModulationLocked);
            }
            state.modulation = parse_bool(value).ok_or(ParamError::Malformed)?;
        }
        Parameter::Temp | Parameter::RealOutputPower | Parameter::InputPower => {
            return Err(ParamError::ReadOnly);
        }
    }

    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Render a parameter the way GET reports it.
pub fn render_parameter(state: &RadioState, parameter: Parameter) -> String {
    match parameter {
        Parameter::NominalOutputPower => format!("{:.6}", state.nominal_output_power),
        Parameter::Frequency => format!("{:.6}", state.frequency),
        Parameter::AutomaticModulation => on_off(state.automatic_modulation).to_string(),
        Parameter::Modulation if state.automatic_modulation => "auto".to_string(),
        Parameter::Modulation => on_off(state.modulation).to_string(),
        Parameter::Temp => format!("{:.6}", state.temp),
        Parameter::RealOutputPower => format!("{:.6}", state.real_output_power),
        Parameter::InputPower => format!("{:.6}", state.input_power),
    }
}

pub fn get_parameter(state: &RadioState, name: &str) -> Result<String, ParamError> {
    let parameter: Parameter = name.parse()?;
    Ok(render_parameter(state, parameter))
}
