//! Fixed-interval dispatch loop.

use crate::dispatch::Dispatcher;
use crate::queue::BatchSink;
use crate::source::RecordSource;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Time between two dispatch cycles.
pub const DISPATCH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// What to do when a tick fires while an earlier cycle is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Start another cycle regardless; cycles may run concurrently.
    #[default]
    Allow,
    /// Skip the tick.
    SkipIfRunning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_started: usize,
    pub ticks_skipped: usize,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Duration,
    overlap: OverlapPolicy,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DISPATCH_PERIOD, OverlapPolicy::default())
    }
}

impl Scheduler {
    pub fn new(period: Duration, overlap: OverlapPolicy) -> Self {
        Self { period, overlap }
    }

    /// Starts a cycle every period until `shutdown` resolves.
    ///
    /// The first cycle fires one full period after the call. Each cycle runs in its own task;
    /// the handles are kept so that shutdown waits for in-flight cycles instead of
    /// abandoning them.
    pub async fn run<R, S, F>(
        &self,
        dispatcher: Arc<Dispatcher<R, S>>,
        shutdown: F,
    ) -> SchedulerStats
    where
        R: RecordSource + 'static,
        S: BatchSink + 'static,
        F: Future<Output = ()>,
    {
        let mut stats = SchedulerStats::default();
        let mut cycles = JoinSet::new();

        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("[dispatcher] shutting down, waiting for {} running cycles.", cycles.len());
                    break;
                }
                _ = ticker.tick() => {
                    while let Some(result) = cycles.try_join_next() {
                        log_join(result);
                    }

                    if self.overlap == OverlapPolicy::SkipIfRunning && !cycles.is_empty() {
                        log::warn!("[dispatcher] previous cycle still running, skipping this tick.");
                        stats.ticks_skipped += 1;
                        continue;
                    }

                    let dispatcher = dispatcher.clone();
                    cycles.spawn(async move { dispatcher.run_cycle().await });
                    stats.cycles_started += 1;
                }
            }
        }

        while let Some(result) = cycles.join_next().await {
            log_join(result);
        }

        stats
    }
}

fn log_join<T>(result: Result<T, tokio::task::JoinError>) {
    if let Err(e) = result {
        log::error!("[dispatcher] dispatch cycle panicked: {}", e);
    }
}
