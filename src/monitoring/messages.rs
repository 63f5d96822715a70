//! Commands accepted by the monitoring engine task

use tokio::sync::oneshot;

#[derive(Debug)]
pub enum EngineCommand {
    /// Run one tick immediately, regardless of the timer
    ///
    /// Used by tests to step the engine deterministically.
    TickNow { respond_to: oneshot::Sender<()> },

    /// Restart the timer with a new period
    UpdateInterval { interval_ms: u64 },

    /// Discard the registered alarms and stop the engine after the current tick
    Shutdown,
}
