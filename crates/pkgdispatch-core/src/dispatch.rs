//! One dispatch cycle: read every package, then publish it.

use crate::publisher::{PublishReport, Publisher};
use crate::queue::BatchSink;
use crate::source::{ReadError, RecordSource};

/// Result of a dispatch cycle.
///
/// Failures are logged where they happen; the outcome only tells the caller how far
/// the cycle got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(PublishReport),
    ReadFailed,
    PublishFailed { batches_sent: usize },
}

/// Owns the handles a dispatch cycle needs.
///
/// Built once at startup and shared behind an `Arc`; cycles only read through it,
/// so several may run at the same time.
pub struct Dispatcher<R, S> {
    source: R,
    publisher: Publisher<S>,
}

impl<R, S> Dispatcher<R, S>
where
    R: RecordSource,
    S: BatchSink,
{
    pub fn new(source: R, publisher: Publisher<S>) -> Self {
        Self { source, publisher }
    }

    pub fn publisher(&self) -> &Publisher<S> {
        &self.publisher
    }

    /// Runs a full read-then-publish cycle. Never fails; errors end the cycle early.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let records = match self.source.fetch_all().await {
            Ok(records) => records,
            Err(e @ ReadError::Query(_)) => {
                log::error!("[dispatcher] error sql query: {}", e);
                return CycleOutcome::ReadFailed;
            }
            // the query ran, but walking its rows failed
            Err(e) => {
                log::error!("[dispatcher] iterate rows: {}", e);
                return CycleOutcome::ReadFailed;
            }
        };

        log::debug!("[dispatcher] {} packages read.", records.len());

        match self.publisher.publish(&records).await {
            Ok(report) => CycleOutcome::Completed(report),
            Err(e) => {
                log::error!("[dispatcher] error send messages: {}", e);
                CycleOutcome::PublishFailed {
                    batches_sent: e.batches_sent(),
                }
            }
        }
    }
}
