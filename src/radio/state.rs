use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;

/// Resimulation bounds for the read-only measurements (half-open)
pub const TEMP_SIM_RANGE: std::ops::Range<f64> = -50.0..120.0;
pub const REAL_OUTPUT_POWER_SIM_RANGE: std::ops::Range<f64> = -5.0..15.0;
pub const INPUT_POWER_SIM_RANGE: std::ops::Range<f64> = -35.0..5.0;

/// Parameters and measurements of the simulated radio
#[derive(Debug, Clone, PartialEq)]
pub struct RadioState {
    /// dBm, writable within 0..=10
    pub nominal_output_power: f64,
    /// MHz, writable within 25..=26 on a 0.1 grid
    pub frequency: f64,
    pub automatic_modulation: bool,
    /// Only writable while automatic modulation is off
    pub modulation: bool,
    /// Celsius, read-only
    pub temp: f64,
    /// dBm, read-only
    pub real_output_power: f64,
    /// dBm, read-only
    pub input_power: f64,
}

impl Default for RadioState {
    fn default() -> Self {
        Self {
            nominal_output_power: 0.0,
            frequency: 25.0,
            automatic_modulation: true,
            modulation: true,
            temp: 0.0,
            real_output_power: 0.0,
            input_power: -15.0,
        }
    }
}

impl RadioState {
    /// Initial state with a random modulation flag and freshly simulated measurements.
    pub fn simulated<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut state = Self {
            modulation: rng.random_bool(0.5),
            ..Self::default()
        };
        state.resimulate(rng);
        state
    }

    /// Draw new values for the read-only measurements.
    pub fn resimulate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.temp = rng.random_range(TEMP_SIM_RANGE);
        self.real_output_power = rng.random_range(REAL_OUTPUT_POWER_SIM_RANGE);
        self.input_power = rng.random_range(INPUT_POWER_SIM_RANGE);
    }
}

/// Radio state shared by the command handlers of one dispatcher
#[derive(Debug, Clone, Default)]
pub struct SharedRadio(Arc<Mutex<RadioState>>);

impl SharedRadio {
    pub fn new(state: RadioState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock the state. A handler that panicked mid-update leaves plain data behind, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, RadioState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> RadioState {
        self.lock().clone()
    }
}
