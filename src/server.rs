//! One serving cycle of the radio server
//!
//! A cycle owns a fresh transport, radio state and monitoring engine. It polls the
//! mailbox, answers commands and republishes the monitoring snapshot until a stop is
//! requested or no command has arrived for the inactivity timeout.

use std::sync::Arc;

use anyhow::Context;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::daemon::StopSignal;
use crate::dispatcher::Dispatcher;
use crate::monitoring::{MonitorHandle, Sensor};
use crate::radio::{RadioAlarm, RadioState, SharedRadio};
use crate::transport::{MonitoringSnapshot, ResourceNames, ServerTransport};

/// How a serving cycle ended without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No command arrived within the inactivity timeout
    Idle,
    /// A stop was requested
    Stopped,
}

fn log_alarm(alarm: &RadioAlarm) {
    warn!(target: "alarm", level = %alarm.level, "{}", alarm.message);
}

pub struct RadioServer {
    config: Config,
    transport: ServerTransport,
    dispatcher: Dispatcher,
    monitor: MonitorHandle,
}

impl RadioServer {
    /// Create the IPC resources and start the monitoring engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &Config, names: &ResourceNames) -> anyhow::Result<Self> {
        let transport =
            ServerTransport::open(names).context("failed to set up the mailbox transport")?;
        let monitor = MonitorHandle::spawn(config.polling_interval_ms);
        let radio = SharedRadio::new(RadioState::simulated(&mut rand::rng()));
        let dispatcher = Dispatcher::new(radio, monitor.clone(), Arc::new(log_alarm));

        Ok(Self {
            config: config.clone(),
            transport,
            dispatcher,
            monitor,
        })
    }

    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    #[instrument(skip_all, name = "serving_cycle")]
    pub async fn run(mut self, stop: StopSignal) -> anyhow::Result<CycleOutcome> {
        info!(
            inactivity_timeout = ?self.config.inactivity_timeout(),
            "radio control server started"
        );

        let mut poll = interval(self.config.command_poll());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_command = Instant::now();

        let outcome = loop {
            tokio::select! {
                _ = poll.tick() => {}
                _ = stop.wait() => break CycleOutcome::Stopped,
            }

            if self.serve_pending()? {
                last_command = Instant::now();
            }
            self.publish_snapshot();

            if last_command.elapsed() >= self.config.inactivity_timeout() {
                info!("no commands within the inactivity timeout, ending cycle");
                break CycleOutcome::Idle;
            }
        };

        self.monitor.shutdown().await;
        info!(?outcome, "radio control server stopped");
        Ok(outcome)
    }

    /// Answer the pending command, if there is one.
    fn serve_pending(&mut self) -> anyhow::Result<bool> {
        let Some(pending) = self
            .transport
            .try_receive()
            .context("failed to poll for commands")?
        else {
            return Ok(false);
        };

        debug!(command = pending.command(), "processing command");
        let response = self.dispatcher.execute(pending.command());
        pending
            .respond(&response)
            .context("failed to deliver response")?;
        Ok(true)
    }

    fn publish_snapshot(&self) {
        let state = self.monitor.state();
        let reading = |sensor| state.sensors().channel(sensor).reading();

        self.transport.publish_snapshot(&MonitoringSnapshot {
            temperature: reading(Sensor::Temperature),
            current: reading(Sensor::Current),
            power: reading(Sensor::Power),
            voltage: reading(Sensor::Voltage),
            active_alarms_count: i32::try_from(state.registry().active_count())
                .unwrap_or(i32::MAX),
            service_enabled: state.service_enabled(),
            last_update: state.last_update().format("%H:%M:%S").to_string(),
        });
    }
}
