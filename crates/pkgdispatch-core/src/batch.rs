//! Batch composition for `SendMessageBatch`.
//!
//! Records are packed greedily in input order. When a batch is sealed is decided by
//! [`SealPolicy::decide`], a pure function of the current batch state and the size of the
//! next entry, so both sealing rules can be checked without touching a queue.

use crate::record::{EntryId, EntryIdError, Record};
use std::collections::HashSet;
use std::fmt;

/// Maximum number of entries SQS accepts in one `SendMessageBatch` call.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// Upper bound (exclusive) on the summed message body size of a batch.
pub const MAX_BATCH_BYTES: usize = 250 * 1024;

/// A single message inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub body: String,
}

impl Entry {
    pub fn from_record(record: &Record) -> Result<Self, EntryIdError> {
        Ok(Self {
            id: EntryId::new(record.id.as_str())?,
            body: record.message_body(),
        })
    }

    /// Serialised size in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    DuplicateEntry(EntryId),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::DuplicateEntry(id) => write!(f, "duplicate entry id in batch: {}", id),
        }
    }
}

impl std::error::Error for BatchError {}

/// Snapshot of a batch used for sealing decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchState {
    pub len: usize,
    pub bytes: usize,
}

/// Ordered group of entries destined for one transmission call.
#[derive(Debug, Default)]
pub struct Batch {
    entries: Vec<Entry>,
    ids: HashSet<EntryId>,
    bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, rejecting ids already present in this batch.
    pub fn push(&mut self, entry: Entry) -> Result<(), BatchError> {
        if !self.ids.insert(entry.id.clone()) {
            return Err(BatchError::DuplicateEntry(entry.id));
        }
        self.bytes += entry.len();
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accumulated body size in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn state(&self) -> BatchState {
        BatchState {
            len: self.entries.len(),
            bytes: self.bytes,
        }
    }

    /// Hands out the current contents and resets the batch to empty.
    pub fn take(&mut self) -> Batch {
        std::mem::take(self)
    }
}

/// What to do with the next entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealDecision {
    /// Add it to the open batch.
    Append,
    /// Add it, then transmit the batch.
    AppendThenSeal,
    /// Transmit the open batch first, then start a new one with it.
    SealThenAppend,
    /// The entry can never fit in a batch and is skipped.
    Reject,
}

/// Rule used to decide when a batch is sealed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SealPolicy {
    /// Seal only when the batch reaches exactly ten entries while still under the byte limit.
    ///
    /// If the byte limit is reached first the batch keeps growing past ten entries and is never
    /// sealed for the rest of the cycle.
    #[default]
    Parity,
    /// Seal whenever the next entry would hit either limit. Entries that cannot fit even
    /// in an empty batch are rejected.
    Strict,
}

impl SealPolicy {
    pub fn decide(self, state: BatchState, next_len: usize) -> SealDecision {
        match self {
            SealPolicy::Parity => {
                if state.len + 1 == MAX_BATCH_ENTRIES && state.bytes + next_len < MAX_BATCH_BYTES {
                    SealDecision::AppendThenSeal
                } else {
                    SealDecision::Append
                }
            }
            SealPolicy::Strict => {
                if next_len >= MAX_BATCH_BYTES {
                    SealDecision::Reject
                } else if state.len > 0 && state.bytes + next_len >= MAX_BATCH_BYTES {
                    SealDecision::SealThenAppend
                } else if state.len + 1 >= MAX_BATCH_ENTRIES {
                    SealDecision::AppendThenSeal
                } else {
                    SealDecision::Append
                }
            }
        }
    }
}

/// What happens to a partially filled batch once the input is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingPolicy {
    /// Discard it. Up to nine records per cycle are never enqueued.
    #[default]
    Drop,
    /// Transmit it like any other batch.
    Flush,
}

/// Sealing and trailing rules applied together.
///
/// Only [`BatchPolicy::parity`] and [`BatchPolicy::strict`] can be built; an unsealed parity
/// batch may exceed both limits and must never be flushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchPolicy {
    seal: SealPolicy,
    trailing: TrailingPolicy,
}

impl BatchPolicy {
    /// Seals only full batches and drops the trailing one.
    pub fn parity() -> Self {
        Self {
            seal: SealPolicy::Parity,
            trailing: TrailingPolicy::Drop,
        }
    }

    /// Never exceeds either limit and never drops the trailing batch.
    pub fn strict() -> Self {
        Self {
            seal: SealPolicy::Strict,
            trailing: TrailingPolicy::Flush,
        }
    }

    pub fn seal(&self) -> SealPolicy {
        self.seal
    }

    pub fn trailing(&self) -> TrailingPolicy {
        self.trailing
    }
}
