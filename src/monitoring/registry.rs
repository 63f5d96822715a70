//! Ordered, lock-guarded collection of alarms raised by the threshold engine
//!
//! Every critical section copies in or out and returns; formatting and logging happen on
//! the copies, outside the lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use super::sensors::Sensor;

/// Alarm ids are unique for the whole process, across serving-cycle restarts.
static NEXT_ALARM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub id: u64,
    pub sensor: Sensor,
    pub message: String,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Local>,
    pub acknowledged: bool,
    pub active: bool,
}

/// Everything about an alarm except what the registry assigns
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlarm {
    pub sensor: Sensor,
    pub message: String,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    alarms: Vec<Alarm>,
    total_triggered: u64,
}

#[derive(Debug, Default)]
pub struct AlarmRegistry {
    inner: Mutex<RegistryInner>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an alarm with a fresh id and return a copy of the stored record.
    pub fn add(&self, alarm: NewAlarm) -> Alarm {
        let alarm = Alarm {
            id: NEXT_ALARM_ID.fetch_add(1, Ordering::Relaxed),
            sensor: alarm.sensor,
            message: alarm.message,
            severity: alarm.severity,
            value: alarm.value,
            threshold: alarm.threshold,
            timestamp: Local::now(),
            acknowledged: false,
            active: true,
        };

        let mut inner = self.lock();
        inner.alarms.push(alarm.clone());
        inner.total_triggered += 1;
        alarm
    }

    /// Point-in-time copy of the active alarms, in insertion order.
    pub fn list_active(&self) -> Vec<Alarm> {
        self.lock()
            .alarms
            .iter()
            .filter(|alarm| alarm.active)
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.lock().alarms.iter().filter(|alarm| alarm.active).count()
    }

    /// Mark an alarm acknowledged. Returns `false` for an unknown id.
    pub fn acknowledge(&self, id: u64) -> bool {
        match self.lock().alarms.iter_mut().find(|alarm| alarm.id == id) {
            Some(alarm) => {
                alarm.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Remove the acknowledged alarms. Returns how many were removed.
    pub fn clear_acknowledged(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.alarms.len();
        inner.alarms.retain(|alarm| !alarm.acknowledged);
        before - inner.alarms.len()
    }

    pub fn clear_all(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.alarms.len();
        inner.alarms.clear();
        removed
    }

    /// Number of alarms ever added to this registry
    pub fn total_triggered(&self) -> u64 {
        self.lock().total_triggered
    }
}
