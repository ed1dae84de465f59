//! Poll loop driver

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{CycleOutcome, DecisionEngine};
use crate::signals::SignalHub;

/// What a finished loop did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub errors: u64,
    pub last: Option<CycleOutcome>,
}

/// Runs decision cycles at a fixed cadence.
///
/// Cycles never overlap. A cycle that overruns the interval is followed
/// immediately by the next one.
pub struct PollLoop {
    engine: DecisionEngine,
    hub: SignalHub,
    interval: Duration,
    single_shot: bool,
}

impl PollLoop {
    pub fn new(engine: DecisionEngine, hub: SignalHub, interval: Duration) -> Self {
        Self {
            engine,
            hub,
            interval,
            single_shot: false,
        }
    }

    /// Run exactly one cycle, then clean up and return
    pub fn single_shot(mut self, single_shot: bool) -> Self {
        self.single_shot = single_shot;
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Cycle until `cancel` fires (or once, in single-shot mode). The
    /// original brightness is restored before returning.
    pub async fn run(mut self, cancel: CancellationToken) -> PollSummary {
        info!(
            "Starting privacy guard (interval {:?}, single shot: {})",
            self.interval, self.single_shot
        );
        let mut summary = PollSummary::default();

        while !cancel.is_cancelled() {
            let started = Instant::now();
            summary.cycles += 1;
            metrics::counter!("privacy_guard_cycles_total").increment(1);

            match self.engine.cycle(&self.hub).await {
                Ok(outcome) => {
                    debug!(
                        "Cycle {}: {} face(s), {:?} ({})",
                        summary.cycles,
                        outcome.face_count,
                        outcome.verdict.decision,
                        outcome.verdict.reason
                    );
                    summary.last = Some(outcome);
                }
                Err(e) => {
                    summary.errors += 1;
                    metrics::counter!("privacy_guard_cycle_errors_total").increment(1);
                    warn!("Decision cycle {} failed: {}", summary.cycles, e);
                }
            }

            if self.single_shot {
                break;
            }

            let pause = self.interval.saturating_sub(started.elapsed());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        if let Err(e) = self.engine.stop().await {
            error!("Failed to restore brightness on shutdown: {}", e);
        }
        info!(
            "Privacy guard stopped after {} cycles ({} failed)",
            summary.cycles, summary.errors
        );
        summary
    }
}
