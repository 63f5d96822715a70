//! Stop requests: the cancellation token shared by the signal path and the supervised loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct StopInner {
    requested: AtomicBool,
    notify: Notify,
}

/// Once requested, a stop stays requested. Every clone observes the same request.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            debug!("stop requested");
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolve once a stop has been requested.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent request is not missed
            notified.as_mut().enable();

            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless a stop is requested first.
    /// Returns `true` when the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_stop_requested(),
            _ = self.wait() => false,
        }
    }
}

/// Turn SIGTERM and SIGINT into stop requests; log SIGHUP and otherwise ignore it.
///
/// The OS-level handler installed by tokio only wakes this task, which then flips the flag.
pub fn install_signal_handlers(stop: StopSignal) -> anyhow::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("failed to register SIGHUP handler")?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("SIGTERM received, stopping");
                    stop.request_stop();
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, stopping");
                    stop.request_stop();
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received, ignoring");
                }
            }
        }
    }))
}
