//! Package rows read from the database and the queue entry identifiers derived from them.

use std::fmt;

/// One row of the `packages` table.
///
/// A record lives for a single dispatch cycle: it is decoded from the database,
/// serialised into a message body, and dropped once the cycle ends.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct Record {
    /// Primary key, reused as the SQS batch entry id
    #[sqlx(rename = "package_id")]
    pub id: String,
    /// Code host, e.g. `github.com`
    #[sqlx(rename = "package_host")]
    pub host: String,
    #[sqlx(rename = "package_owner")]
    pub owner: String,
    #[sqlx(rename = "package_repo")]
    pub repo: String,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Serialises the record as the message body consumed by the workers.
    ///
    /// Fields are joined verbatim in the order id, host, owner, repo.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgdispatch::Record;
    ///
    /// let record = Record::new("42", "github.com", "acme", "widgets");
    /// assert_eq!(record.message_body(), "42,github.com,acme,widgets");
    /// ```
    pub fn message_body(&self) -> String {
        format!("{},{},{},{}", self.id, self.host, self.owner, self.repo)
    }
}

/// Identifier of an entry inside a `SendMessageBatch` request.
///
/// SQS only accepts 1 to 80 characters made of alphanumerics, hyphens and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryIdError {
    Empty,
    TooLong(usize),
    InvalidCharacter(char),
}

impl fmt::Display for EntryIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryIdError::Empty => write!(f, "entry id cannot be empty"),
            EntryIdError::TooLong(len) => write!(
                f,
                "entry id exceeds maximum length: {} > {} characters",
                len,
                EntryId::MAX_LEN
            ),
            EntryIdError::InvalidCharacter(c) => write!(
                f,
                "invalid character in entry id: '{}'. Allowed: alphanumeric, '-', '_'",
                c
            ),
        }
    }
}

impl std::error::Error for EntryIdError {}

impl EntryId {
    pub const MAX_LEN: usize = 80;

    pub fn new<S: Into<String>>(id: S) -> Result<Self, EntryIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EntryIdError::Empty);
        }
        if id.len() > Self::MAX_LEN {
            return Err(EntryIdError::TooLong(id.len()));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(EntryIdError::InvalidCharacter(c));
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for EntryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
