use thiserror::Error;
use crate::database::DatabaseError;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Not found error
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint would be violated
    #[error("{0}")]
    Conflict(String),

    /// A cardinality limit has been reached
    #[error("{0}")]
    LimitReached(String),

    /// Date parsing error
    #[error("Date parsing error: {0}")]
    DateParse(String),
}

impl RepositoryError {
    /// Whether the underlying SQLite error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl From<String> for RepositoryError {
    fn from(error: String) -> Self {
        RepositoryError::Database(DatabaseError::GenericError(error))
    }
}

impl From<chrono::ParseError> for RepositoryError {
    fn from(error: chrono::ParseError) -> Self {
        RepositoryError::DateParse(error.to_string())
    }
}
