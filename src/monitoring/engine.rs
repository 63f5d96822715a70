//! MonitorEngine - Periodically samples the sensor channels and raises threshold alarms
//!
//! The engine is an actor: it owns a timer and a command receiver, while the state it
//! mutates lives in an [`Arc<MonitorState>`] that the command path reads and configures
//! concurrently.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → service enabled? → sample channels → evaluate thresholds → Registry
//!     ↑
//!     └─── Commands (TickNow, UpdateInterval, Shutdown)
//! ```
//!
//! ## Consistency
//!
//! Only the alarm registry is locked. Readings, flags and counters are individual atomics
//! updated without ordering guarantees between them, so a reader may observe a tick
//! halfway through. That is acceptable for values that are only ever displayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, instrument, trace, warn};

use super::messages::EngineCommand;
use super::registry::{Alarm, AlarmRegistry, NewAlarm, Severity};
use super::sensors::{SensorBank, SensorChannel};
use super::thresholds::ThresholdEvaluation;

pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 1000;

/// Monitoring state shared between the engine task and the command handlers
#[derive(Debug)]
pub struct MonitorState {
    sensors: SensorBank,
    registry: AlarmRegistry,
    service_enabled: AtomicBool,
    polling_interval_ms: AtomicU64,
    total_updates: AtomicU64,
    last_update_ms: AtomicI64,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(DEFAULT_POLLING_INTERVAL_MS)
    }
}

impl MonitorState {
    pub fn new(polling_interval_ms: u64) -> Self {
        Self {
            sensors: SensorBank::default(),
            registry: AlarmRegistry::new(),
            service_enabled: AtomicBool::new(true),
            polling_interval_ms: AtomicU64::new(polling_interval_ms.max(1)),
            total_updates: AtomicU64::new(0),
            last_update_ms: AtomicI64::new(Local::now().timestamp_millis()),
        }
    }

    pub fn sensors(&self) -> &SensorBank {
        &self.sensors
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    pub fn service_enabled(&self) -> bool {
        self.service_enabled.load(Ordering::Relaxed)
    }

    pub fn set_service_enabled(&self, enabled: bool) {
        self.service_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn polling_interval_ms(&self) -> u64 {
        self.polling_interval_ms.load(Ordering::Relaxed)
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates.load(Ordering::Relaxed)
    }

    pub fn last_update(&self) -> DateTime<Local> {
        let millis = self.last_update_ms.load(Ordering::Relaxed);
        Local
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Local::now)
    }

    /// Sample every enabled and monitored channel, then bump the tick statistics.
    pub fn update_sensors<R: Rng + ?Sized>(&self, rng: &mut R) {
        for channel in self.sensors.iter() {
            channel.refresh(rng);
        }
        self.last_update_ms
            .store(Local::now().timestamp_millis(), Ordering::Relaxed);
        self.total_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Evaluate every monitored channel and record at most one alarm per channel.
    /// Returns the alarms raised by this evaluation.
    pub fn check_thresholds(&self) -> Vec<Alarm> {
        let raised: Vec<Alarm> = self
            .sensors
            .iter()
            .filter(|channel| channel.is_monitored())
            .filter_map(Self::evaluate_channel)
            .map(|alarm| self.registry.add(alarm))
            .collect();

        for alarm in &raised {
            warn!(
                target: "alarm",
                id = alarm.id,
                sensor = %alarm.sensor,
                severity = %alarm.severity,
                "{}",
                alarm.message
            );
        }

        raised
    }

    fn evaluate_channel(channel: &SensorChannel) -> Option<NewAlarm> {
        let value = channel.reading();
        let (severity, threshold) =
            match ThresholdEvaluation::evaluate(value, &channel.spec.thresholds) {
                ThresholdEvaluation::Ok => return None,
                ThresholdEvaluation::Warning { threshold } => (Severity::Warning, threshold),
                ThresholdEvaluation::Error { threshold } => (Severity::Error, threshold),
            };

        let sensor = channel.sensor;
        Some(NewAlarm {
            sensor,
            message: format!(
                "{} {severity} threshold exceeded: {value:.2}{}",
                sensor.label(),
                sensor.unit()
            ),
            severity,
            value,
            threshold,
        })
    }
}

/// Actor that drives the periodic sampling
pub struct MonitorEngine {
    state: Arc<MonitorState>,

    command_rx: mpsc::Receiver<EngineCommand>,

    interval_duration: Duration,
}

impl MonitorEngine {
    pub fn new(state: Arc<MonitorState>, command_rx: mpsc::Receiver<EngineCommand>) -> Self {
        let interval_duration = Duration::from_millis(state.polling_interval_ms());
        Self {
            state,
            command_rx,
            interval_duration,
        }
    }

    /// Run until a Shutdown command arrives or every handle is dropped.
    #[instrument(skip(self), name = "monitor_engine")]
    pub async fn run(mut self) {
        debug!(interval = ?self.interval_duration, "starting monitoring engine");

        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::TickNow { respond_to }) => {
                            self.tick();
                            let _ = respond_to.send(());
                        }

                        Some(EngineCommand::UpdateInterval { interval_ms }) => {
                            debug!("updating polling interval to {interval_ms}ms");
                            self.interval_duration = Duration::from_millis(interval_ms);
                            ticker = self.ticker();
                        }

                        Some(EngineCommand::Shutdown) => {
                            let discarded = self.state.registry().clear_all();
                            debug!(discarded, "received shutdown command, alarms discarded");
                            break;
                        }

                        // Every handle is gone, nobody can observe the engine anymore
                        None => {
                            debug!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("monitoring engine stopped");
    }

    fn ticker(&self) -> tokio::time::Interval {
        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn tick(&self) {
        if !self.state.service_enabled() {
            trace!("service disabled, skipping tick");
            return;
        }

        self.state.update_sensors(&mut rand::rng());
        let raised = self.state.check_thresholds();
        trace!(
            raised = raised.len(),
            updates = self.state.total_updates(),
            "tick complete"
        );
    }
}

/// Handle for controlling a running MonitorEngine
///
/// Cloneable; every clone shares the same state and command channel.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<EngineCommand>,

    state: Arc<MonitorState>,
}

impl MonitorHandle {
    /// Spawn the engine on the current tokio runtime.
    pub fn spawn(polling_interval_ms: u64) -> Self {
        Self::spawn_with_state(Arc::new(MonitorState::new(polling_interval_ms)))
    }

    pub fn spawn_with_state(state: Arc<MonitorState>) -> Self {
        let (sender, receiver) = mpsc::channel(16);
        let engine = MonitorEngine::new(state.clone(), receiver);
        tokio::spawn(engine.run());
        Self { sender, state }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Change the timer period. Zero is rejected, and so is a change the engine cannot be
    /// told about; either way the reported interval stays the one the ticker uses.
    pub fn set_polling_interval(&self, interval_ms: u64) -> bool {
        if interval_ms == 0 {
            return false;
        }

        if let Err(e) = self
            .sender
            .try_send(EngineCommand::UpdateInterval { interval_ms })
        {
            warn!("failed to notify engine of new interval: {e}");
            return false;
        }
        self.state
            .polling_interval_ms
            .store(interval_ms, Ordering::Relaxed);
        true
    }

    /// Run one tick now and wait for it to finish.
    pub async fn tick_now(&self) -> anyhow::Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(EngineCommand::TickNow { respond_to })
            .await
            .map_err(|_| anyhow::anyhow!("monitoring engine is not running"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("monitoring engine stopped before responding"))
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(EngineCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::sensors::Sensor;

    #[test]
    fn test_check_raises_error_before_warning() {
        let state = MonitorState::default();
        state
            .sensors()
            .channel(Sensor::Temperature)
            .set_reading(100.0);

        let raised = state.check_thresholds();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, Severity::Error);
        assert_eq!(raised[0].threshold, 85.0);
        assert_eq!(raised[0].sensor, Sensor::Temperature);
    }

    #[test]
    fn test_check_skips_unmonitored_channels() {
        let state = MonitorState::default();
        let channel = state.sensors().channel(Sensor::Current);
        channel.set_reading(9.5);
        channel.set_monitored(false);

        assert!(state.check_thresholds().is_empty());
        assert_eq!(state.registry().total_triggered(), 0);
    }

    #[test]
    fn test_initial_readings_raise_nothing() {
        let state = MonitorState::default();
        assert!(state.check_thresholds().is_empty());
    }

    #[test]
    fn test_update_counts_ticks() {
        let state = MonitorState::default();
        state.update_sensors(&mut rand::rng());
        state.update_sensors(&mut rand::rng());
        assert_eq!(state.total_updates(), 2);
    }

    #[tokio::test]
    async fn test_disabled_service_skips_tick() {
        let handle = MonitorHandle::spawn(60_000);
        handle.state().set_service_enabled(false);

        handle.tick_now().await.unwrap();

        assert_eq!(handle.state().total_updates(), 0);
        assert_eq!(
            handle.state().sensors().channel(Sensor::Voltage).reading(),
            220.0
        );
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_enabled_service_ticks() {
        let handle = MonitorHandle::spawn(60_000);

        handle.tick_now().await.unwrap();

        assert_eq!(handle.state().total_updates(), 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let handle = MonitorHandle::spawn(1000);

        assert!(!handle.set_polling_interval(0));
        assert_eq!(handle.state().polling_interval_ms(), 1000);

        assert!(handle.set_polling_interval(250));
        assert_eq!(handle.state().polling_interval_ms(), 250);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_undeliverable_interval_is_not_reported() {
        // No engine drains this channel, so the second update finds it full
        let (sender, _receiver) = mpsc::channel(1);
        let handle = MonitorHandle {
            sender,
            state: Arc::new(MonitorState::new(1000)),
        };

        assert!(handle.set_polling_interval(500));
        assert!(!handle.set_polling_interval(250));
        assert_eq!(handle.state().polling_interval_ms(), 500);
    }

    #[tokio::test]
    async fn test_stopped_engine_keeps_interval() {
        let handle = MonitorHandle::spawn(1000);
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.set_polling_interval(250));
        assert_eq!(handle.state().polling_interval_ms(), 1000);
    }

    #[tokio::test]
    async fn test_shutdown_discards_alarms() {
        let handle = MonitorHandle::spawn(60_000);
        handle
            .state()
            .sensors()
            .channel(Sensor::Power)
            .set_reading(95.0);
        assert_eq!(handle.state().check_thresholds().len(), 1);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.state().registry().active_count(), 0);
        assert_eq!(handle.state().registry().total_triggered(), 1);
    }

    #[tokio::test]
    async fn test_timer_drives_ticks() {
        let handle = MonitorHandle::spawn(10);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(handle.state().total_updates() > 0);
        handle.shutdown().await;
    }
}
