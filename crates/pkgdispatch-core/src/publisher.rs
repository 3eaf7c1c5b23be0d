use crate::batch::{Batch, BatchError, BatchPolicy, Entry, SealDecision, TrailingPolicy};
use crate::queue::{BatchSink, SendError};
use crate::record::{EntryIdError, Record};
use std::fmt;

/// Totals for one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PublishReport {
    pub batches_sent: usize,
    pub entries_sent: usize,
    pub bytes_sent: usize,
    /// Entries left in the unsealed trailing batch under [`TrailingPolicy::Drop`]
    pub entries_dropped: usize,
    /// Entries too large to ever fit in a batch
    pub entries_rejected: usize,
}

#[derive(Debug)]
pub enum PublishError {
    InvalidEntry {
        record_id: String,
        source: EntryIdError,
    },
    DuplicateEntry(BatchError),
    Send {
        batches_sent: usize,
        source: SendError,
    },
}

impl PublishError {
    /// Batches that reached the queue before the failure.
    pub fn batches_sent(&self) -> usize {
        match self {
            PublishError::Send { batches_sent, .. } => *batches_sent,
            _ => 0,
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::InvalidEntry { record_id, source } => {
                write!(f, "record {:?} cannot be enqueued: {}", record_id, source)
            }
            PublishError::DuplicateEntry(e) => write!(f, "{}", e),
            PublishError::Send {
                batches_sent,
                source,
            } => write!(f, "{} (after {} batches)", source, batches_sent),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::InvalidEntry { source, .. } => Some(source),
            PublishError::DuplicateEntry(e) => Some(e),
            PublishError::Send { source, .. } => Some(source),
        }
    }
}

/// Packs records into size and count bounded batches and sends them in order.
pub struct Publisher<S> {
    sink: S,
    policy: BatchPolicy,
}

impl<S: BatchSink> Publisher<S> {
    pub fn new(sink: S, policy: BatchPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Sends `records` as batches, preserving their order within and across batches.
    ///
    /// Stops at the first failed transmission; batches sent before it stay sent and the
    /// remaining records are discarded.
    pub async fn publish(&self, records: &[Record]) -> Result<PublishReport, PublishError> {
        let mut report = PublishReport::default();
        let mut batch = Batch::new();

        for record in records {
            let entry =
                Entry::from_record(record).map_err(|source| PublishError::InvalidEntry {
                    record_id: record.id.clone(),
                    source,
                })?;

            match self.policy.seal().decide(batch.state(), entry.len()) {
                SealDecision::Append => {
                    batch.push(entry).map_err(PublishError::DuplicateEntry)?;
                }
                SealDecision::AppendThenSeal => {
                    batch.push(entry).map_err(PublishError::DuplicateEntry)?;
                    self.transmit(batch.take(), &mut report).await?;
                }
                SealDecision::SealThenAppend => {
                    self.transmit(batch.take(), &mut report).await?;
                    batch.push(entry).map_err(PublishError::DuplicateEntry)?;
                }
                SealDecision::Reject => {
                    log::warn!(
                        "[dispatcher] skipping record {}: {} bytes exceeds the batch limit",
                        record.id,
                        entry.len()
                    );
                    report.entries_rejected += 1;
                }
            }
        }

        if !batch.is_empty() {
            match self.policy.trailing() {
                TrailingPolicy::Drop => {
                    log::debug!(
                        "[dispatcher] {} trailing messages not transmitted.",
                        batch.len()
                    );
                    report.entries_dropped = batch.len();
                }
                TrailingPolicy::Flush => self.transmit(batch.take(), &mut report).await?,
            }
        }

        Ok(report)
    }

    async fn transmit(&self, batch: Batch, report: &mut PublishReport) -> Result<(), PublishError> {
        self.sink
            .send_batch(&batch)
            .await
            .map_err(|source| PublishError::Send {
                batches_sent: report.batches_sent,
                source,
            })?;

        log::info!("[dispatcher] {} bytes messages transmitted.", batch.bytes());

        report.batches_sent += 1;
        report.entries_sent += batch.len();
        report.bytes_sent += batch.bytes();
        Ok(())
    }
}
