//! Simulated radio equipment: its parameters, their validation and the fixed alarm rules.

pub mod alarm;
pub mod params;
pub mod state;

pub use alarm::{AlarmLevel, RadioAlarm};
pub use params::{ParamError, Parameter};
pub use state::{RadioState, SharedRadio};
