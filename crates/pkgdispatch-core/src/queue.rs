//! SQS client wrapper used to transmit sealed batches.

use crate::batch::Batch;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use sqs::types::SendMessageBatchRequestEntry;
use std::fmt;

#[derive(Debug)]
pub enum SendError {
    EmptyBatch,
    BuildEntryFailed(String),
    AwsSdkError(
        aws_sdk_sqs::error::SdkError<
            aws_sdk_sqs::operation::send_message_batch::SendMessageBatchError,
        >,
    ),
    Other(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::EmptyBatch => write!(f, "refusing to send an empty batch"),
            SendError::BuildEntryFailed(msg) => write!(f, "failed to build message entry: {}", msg),
            SendError::AwsSdkError(e) => match e {
                // service errors carry the message returned by SQS itself
                aws_sdk_sqs::error::SdkError::ServiceError(se) => {
                    write!(f, "AWS SDK error: {}", se.err())
                }
                _ => write!(f, "AWS SDK error: {}", e),
            },
            SendError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SendError {}

/// Destination for sealed batches.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn send_batch(&self, batch: &Batch) -> Result<(), SendError>;
}

/// SQS queue every dispatch cycle publishes to.
///
/// Built once at startup and shared by all cycles; the SDK client is safe to use
/// from several tasks at once.
///
/// # Example
///
/// ```no_run
/// use pkgdispatch::DispatchQueue;
///
/// # async fn example() {
/// let config = aws_config::from_env().load().await;
/// let queue = DispatchQueue::from_config(
///     config,
///     "https://sqs.us-east-1.amazonaws.com/123456789/packages",
/// );
/// # }
/// ```
#[derive(Clone)]
pub struct DispatchQueue {
    client: sqs::Client,
    queue_url: String,
}

impl DispatchQueue {
    pub fn from_config(config: SdkConfig, queue_url: impl Into<String>) -> Self {
        Self {
            client: sqs::Client::new(&config),
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl BatchSink for DispatchQueue {
    async fn send_batch(&self, batch: &Batch) -> Result<(), SendError> {
        // SQS rejects empty batch requests
        if batch.is_empty() {
            return Err(SendError::EmptyBatch);
        }

        let entries = batch
            .entries()
            .iter()
            .map(|entry| {
                SendMessageBatchRequestEntry::builder()
                    .id(entry.id.as_ref())
                    .message_body(entry.body.as_str())
                    .build()
                    .map_err(|e| SendError::BuildEntryFailed(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .send_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(SendError::AwsSdkError)?;

        for failed in output.failed() {
            log::warn!(
                "[dispatcher] entry {} was not enqueued: {} {}",
                failed.id(),
                failed.code(),
                failed.message().unwrap_or_default()
            );
        }

        Ok(())
    }
}
