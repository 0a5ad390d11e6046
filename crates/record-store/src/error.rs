use thiserror::Error;

/// Result alias for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// A row with this path already exists.
    #[error("a record already exists at {0}")]
    UniqueViolation(String),

    #[error("database setup error: {0}")]
    Setup(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl StoreError {
    /// Map an insert/update failure, turning uniqueness violations on the
    /// path key into [`StoreError::UniqueViolation`].
    pub(crate) fn from_write(e: sqlx::Error, path: &str) -> Self {
        match e {
            sqlx::Error::Database(ref db_error) if db_error.is_unique_violation() => {
                StoreError::UniqueViolation(path.to_string())
            }
            _ => StoreError::Sqlite(e),
        }
    }
}
