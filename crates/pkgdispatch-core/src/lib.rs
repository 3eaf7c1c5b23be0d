//! # pkgdispatch-core
//!
//! Periodically republishes the rows of the `packages` table as AWS SQS messages.
//!
//! A dispatch cycle reads every package ordered by id, packs the serialised rows into
//! `SendMessageBatch` requests that respect the SQS limits (10 entries, 250 KiB), and sends
//! them one after another. The [`Scheduler`] starts a cycle once per [`DISPATCH_PERIOD`].
//!
//! ## Features
//!
//! - **Reader**: [`SqlSource`] loads [`Record`]s through any sqlx driver
//! - **Batching**: [`SealPolicy`] and [`TrailingPolicy`] choose between the parity sealing
//!   rules and the corrected ones
//! - **Publishing**: [`Publisher`] sends batches through a [`BatchSink`], usually a [`DispatchQueue`]
//!
//! ## Example
//!
//! ```no_run
//! use pkgdispatch::{BatchPolicy, DispatchQueue, Dispatcher, Publisher, SqlSource};
//!
//! # async fn example() -> Result<(), sqlx::Error> {
//! sqlx::any::install_default_drivers();
//! let pool = sqlx::AnyPool::connect("postgres://localhost/packagebug").await?;
//!
//! let config = aws_config::from_env().load().await;
//! let queue = DispatchQueue::from_config(
//!     config,
//!     "https://sqs.us-east-1.amazonaws.com/123456789/packages",
//! );
//!
//! let dispatcher = Dispatcher::new(
//!     SqlSource::new(pool),
//!     Publisher::new(queue, BatchPolicy::parity()),
//! );
//! let outcome = dispatcher.run_cycle().await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

mod batch;
mod dispatch;
mod publisher;
mod queue;
mod record;
mod scheduler;
mod source;

#[cfg(test)]
mod test_utils;

pub use batch::*;
pub use dispatch::*;
pub use publisher::*;
pub use queue::*;
pub use record::*;
pub use scheduler::*;
pub use source::*;
