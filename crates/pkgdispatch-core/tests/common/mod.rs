use async_trait::async_trait;
use pkgdispatch::{Batch, BatchSink, Record, SendError};
use std::sync::Mutex;

/// Keeps `(id, body)` pairs for every batch it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Vec<(String, String)>> {
        std::mem::take(&mut *self.batches.lock().unwrap())
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn send_batch(&self, batch: &Batch) -> Result<(), SendError> {
        let entries = batch
            .entries()
            .iter()
            .map(|e| (e.id.to_string(), e.body.clone()))
            .collect();
        self.batches.lock().unwrap().push(entries);
        Ok(())
    }
}

/// Builds records with ascending ids from `(host, owner, repo)` triples.
pub fn records_from(fields: Vec<(String, String, String)>) -> Vec<Record> {
    fields
        .into_iter()
        .enumerate()
        .map(|(i, (host, owner, repo))| Record::new(format!("{i:05}"), host, owner, repo))
        .collect()
}
