//! The restart-on-fault loop around serving cycles
//!
//! ```text
//! ┌─▶ build cycle ─▶ run (own task) ─▶ Ok / Err / panic ─▶ stop requested? ─yes─▶ done
//! │                                                              │ no
//! └──────────────────── interruptible backoff ◀──────────────────┘
//! ```
//!
//! Each cycle runs in its own task, so a panic inside it surfaces here as a join error
//! instead of unwinding through the supervisor.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use super::stop::StopSignal;
use crate::server::CycleOutcome;

/// Counters describing one supervised run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub cycles: usize,
    pub faults: usize,
}

/// Run cycles produced by `make_cycle` until a stop is requested.
#[instrument(skip_all, fields(backoff = ?backoff))]
pub async fn supervise<F, Fut>(stop: &StopSignal, backoff: Duration, mut make_cycle: F) -> SupervisorReport
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<CycleOutcome>> + Send + 'static,
{
    let mut report = SupervisorReport::default();

    while !stop.is_stop_requested() {
        report.cycles += 1;
        info!(cycle = report.cycles, "starting serving cycle");

        match tokio::spawn(make_cycle()).await {
            Ok(Ok(outcome)) => info!(?outcome, "serving cycle finished"),
            Ok(Err(e)) => {
                report.faults += 1;
                error!("serving cycle failed: {e:#}");
            }
            Err(join_error) if join_error.is_panic() => {
                report.faults += 1;
                error!("serving cycle panicked: {join_error}");
            }
            Err(join_error) => {
                report.faults += 1;
                warn!("serving cycle was cancelled: {join_error}");
            }
        }

        if stop.is_stop_requested() {
            break;
        }

        info!("restarting in {backoff:?}");
        if !stop.sleep(backoff).await {
            break;
        }
    }

    info!(
        cycles = report.cycles,
        faults = report.faults,
        "supervised loop finished"
    );
    report
}
