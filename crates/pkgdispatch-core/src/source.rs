//! Reads the full set of packages to dispatch.

use crate::record::Record;
use async_trait::async_trait;
use sqlx::AnyPool;
use std::fmt;

const SELECT_PACKAGES: &str = r#"
    SELECT package_id, package_host, package_owner, package_repo
    FROM packages
    ORDER BY package_id ASC
"#;

#[derive(Debug)]
pub enum ReadError {
    /// The query could not be executed or the result stream failed mid-way.
    Query(sqlx::Error),
    /// A row could not be decoded into a [`Record`].
    Decode(sqlx::Error),
    /// A row decoded fine but violates a record invariant.
    InvalidRecord(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Query(e) => write!(f, "query failed: {}", e),
            ReadError::Decode(e) => write!(f, "failed to decode row: {}", e),
            ReadError::InvalidRecord(msg) => write!(f, "invalid record: {}", msg),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Query(e) | ReadError::Decode(e) => Some(e),
            ReadError::InvalidRecord(_) => None,
        }
    }
}

impl From<sqlx::Error> for ReadError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. } => ReadError::Decode(e),
            other => ReadError::Query(other),
        }
    }
}

/// Produces the records for one dispatch cycle.
///
/// Implementations return every record or an error, never a partial list.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Record>, ReadError>;
}

/// [`RecordSource`] backed by the `packages` table.
///
/// The pool is shared by every cycle; the query is read-only so concurrent cycles
/// need no coordination.
#[derive(Clone)]
pub struct SqlSource {
    pool: AnyPool,
}

impl SqlSource {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for SqlSource {
    async fn fetch_all(&self) -> Result<Vec<Record>, ReadError> {
        // fetch_all drains and releases the cursor on success and on every error path
        let records = sqlx::query_as::<_, Record>(SELECT_PACKAGES)
            .fetch_all(&self.pool)
            .await?;

        if let Some(position) = records.iter().position(|r| r.id.is_empty()) {
            return Err(ReadError::InvalidRecord(format!(
                "empty package_id at row {}",
                position + 1
            )));
        }

        Ok(records)
    }
}
