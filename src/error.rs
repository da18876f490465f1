// ⚠️ Error Taxonomy - typed failures for the store, the renderer and the login gate
//
// Only DuplicateKey is an expected, recoverable store failure. Everything wrapped in
// StoreError::Sqlite is unexpected and propagates to the top-level handler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint hit (e.g. a second class named "P.1"). No row was written.
    #[error("{entity} '{value}' already exists")]
    DuplicateKey { entity: &'static str, value: String },

    #[error("class {0} does not exist")]
    UnknownClass(i64),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// A ledger total left the range Decimal can represent.
    #[error("amount overflow: {0}")]
    Overflow(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    /// The summary handed to the renderer is not a consistent aggregate.
    #[error("invalid ledger summary: {0}")]
    InvalidSummary(String),

    #[error("pdf encoding failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("not logged in")]
    NotAuthenticated,

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("password hash error: {0}")]
    PasswordHash(String),
}
