//! Simulated sensor channels
//!
//! Each channel draws a uniform sample from its nominal range. With a small probability the
//! sample is replaced by an excursion outside the range, which is what drives the threshold
//! engine into raising alarms.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rand::Rng;

use super::thresholds::{Band, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Temperature,
    Current,
    Power,
    Voltage,
}

impl Sensor {
    pub const ALL: [Sensor; 4] = [
        Sensor::Temperature,
        Sensor::Current,
        Sensor::Power,
        Sensor::Voltage,
    ];

    /// Lower-case key used in CONFIG parameter names and alarm records
    pub fn key(self) -> &'static str {
        match self {
            Sensor::Temperature => "temperature",
            Sensor::Current => "current",
            Sensor::Power => "power",
            Sensor::Voltage => "voltage",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sensor::Temperature => "Temperature",
            Sensor::Current => "Current",
            Sensor::Power => "Power",
            Sensor::Voltage => "Voltage",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Sensor::Temperature => "°C",
            Sensor::Current => "A",
            Sensor::Power => "W",
            Sensor::Voltage => "V",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Sensor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sensor::ALL.into_iter().find(|sensor| sensor.key() == s).ok_or(())
    }
}

/// Static sampling parameters of a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSpec {
    pub min: f64,
    pub max: f64,
    pub anomaly_probability: f64,
    pub anomaly_scale: f64,
    pub initial: f64,
    pub thresholds: Thresholds,
}

impl ChannelSpec {
    /// The channel table.
    ///
    /// The voltage bands are a local default. Warning is the nominal sampling range and error
    /// widens it by 10 V on each side.
    pub fn for_sensor(sensor: Sensor) -> Self {
        match sensor {
            Sensor::Temperature => Self {
                min: -40.0,
                max: 85.0,
                anomaly_probability: 0.02,
                anomaly_scale: 1.5,
                initial: 25.0,
                thresholds: Thresholds::new(Band::new(-20.0, 70.0), Band::new(-30.0, 85.0)),
            },
            Sensor::Current => Self {
                min: 0.0,
                max: 10.0,
                anomaly_probability: 0.03,
                anomaly_scale: 1.5,
                initial: 5.0,
                thresholds: Thresholds::new(Band::new(1.0, 8.0), Band::new(0.5, 9.0)),
            },
            Sensor::Power => Self {
                min: 0.0,
                max: 100.0,
                anomaly_probability: 0.03,
                anomaly_scale: 1.5,
                initial: 50.0,
                thresholds: Thresholds::new(Band::new(10.0, 80.0), Band::new(5.0, 90.0)),
            },
            Sensor::Voltage => Self {
                min: 200.0,
                max: 240.0,
                anomaly_probability: 0.01,
                anomaly_scale: 1.2,
                initial: 220.0,
                thresholds: Thresholds::new(Band::new(200.0, 240.0), Band::new(190.0, 250.0)),
            },
        }
    }

    /// Draw one reading.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if rng.random_bool(self.anomaly_probability) {
            let excursion = self.anomaly_scale * (self.max - self.min);
            if rng.random_bool(0.5) {
                self.min - excursion
            } else {
                self.max + excursion
            }
        } else {
            rng.random_range(self.min..=self.max)
        }
    }
}

/// A float stored as bits so it can be read and replaced without a lock.
#[derive(Debug)]
struct AtomicReading(AtomicU64);

impl AtomicReading {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Live state of one channel, shared between the engine tick and the command path
#[derive(Debug)]
pub struct SensorChannel {
    pub sensor: Sensor,
    pub spec: ChannelSpec,
    enabled: AtomicBool,
    monitor: AtomicBool,
    reading: AtomicReading,
}

impl SensorChannel {
    pub fn new(sensor: Sensor) -> Self {
        let spec = ChannelSpec::for_sensor(sensor);
        Self {
            sensor,
            spec,
            enabled: AtomicBool::new(true),
            monitor: AtomicBool::new(true),
            reading: AtomicReading::new(spec.initial),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn is_monitored(&self) -> bool {
        self.monitor.load(Ordering::Relaxed)
    }

    pub fn set_monitored(&self, monitor: bool) {
        self.monitor.store(monitor, Ordering::Relaxed);
    }

    pub fn reading(&self) -> f64 {
        self.reading.load()
    }

    pub fn set_reading(&self, value: f64) {
        self.reading.store(value);
    }

    /// Sample a new reading if the channel is enabled and monitored.
    pub fn refresh<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        if !(self.is_enabled() && self.is_monitored()) {
            return false;
        }
        self.reading.store(self.spec.sample(rng));
        true
    }
}

/// The four channels, indexable by [`Sensor`]
#[derive(Debug)]
pub struct SensorBank([SensorChannel; 4]);

impl Default for SensorBank {
    fn default() -> Self {
        Self(Sensor::ALL.map(SensorChannel::new))
    }
}

impl SensorBank {
    pub fn channel(&self, sensor: Sensor) -> &SensorChannel {
        &self.0[sensor.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorChannel> {
        self.0.iter()
    }
}
