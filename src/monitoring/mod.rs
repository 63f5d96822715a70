//! # Monitoring engine
//!
//! Simulated sensor sampling, threshold evaluation and the alarm registry that the
//! `MONITOR` command family inspects and configures.
//!
//! - [`sensors`]: the four simulated channels and their sampling rules
//! - [`thresholds`]: warning/error band evaluation
//! - [`registry`]: the ordered alarm collection
//! - [`engine`]: the timer-driven actor and its handle

pub mod engine;
pub mod messages;
pub mod registry;
pub mod sensors;
pub mod thresholds;

pub use engine::{DEFAULT_POLLING_INTERVAL_MS, MonitorEngine, MonitorHandle, MonitorState};
pub use messages::EngineCommand;
pub use registry::{Alarm, AlarmRegistry, NewAlarm, Severity};
pub use sensors::{ChannelSpec, Sensor, SensorBank, SensorChannel};
pub use thresholds::{Band, ThresholdEvaluation, Thresholds};
