//! Error types for connection and migration operations.
//!
//! [`SqliteError::NotOpen`] is the one failure this layer raises on its
//! own. Engine failures pass through unchanged inside
//! [`SqliteError::DatabaseError`].

use sqlmigrate_core::ParameterError;
use thiserror::Error;

/// Errors that can occur during connection and migration operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The operation needs an open connection and none is held.
    #[error("database is not open")]
    NotOpen,

    /// `open` was called on a wrapper that already holds a connection.
    #[error("database '{0}' is already open")]
    AlreadyOpen(String),

    /// SQLite reported a failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The background executor thread is gone or failed outside SQLite.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Pragma name or value cannot be written into a `PRAGMA` statement.
    #[error("invalid pragma: {0}")]
    InvalidPragma(String),

    /// Named parameter key without a marker.
    #[error("parameter error: {0}")]
    ParameterError(#[from] ParameterError),

    /// A migration batch ran but `user_version` did not move to its version.
    #[error("user_version is {found} after applying migration, expected {expected}")]
    VersionMismatch { expected: u32, found: i64 },

    /// A migration batch failed; earlier migrations stay applied.
    #[error("migration {version} failed: {source}")]
    MigrationError {
        version: u32,
        #[source]
        source: Box<SqliteError>,
    },
}

impl SqliteError {
    /// Stable identifier for the error kind, e.g. `"NOT_OPEN"`.
    pub fn code(&self) -> &'static str {
        match self {
            SqliteError::NotOpen => "NOT_OPEN",
            SqliteError::AlreadyOpen(_) => "ALREADY_OPEN",
            SqliteError::DatabaseError(_) => "SQLITE_ERROR",
            SqliteError::ConnectionError(_) => "CONNECTION_ERROR",
            SqliteError::InvalidPragma(_) => "INVALID_PRAGMA",
            SqliteError::ParameterError(_) => "INVALID_PARAMETER",
            SqliteError::VersionMismatch { .. } => "VERSION_MISMATCH",
            SqliteError::MigrationError { .. } => "MIGRATION_FAILED",
        }
    }

    /// `true` for [`SqliteError::NotOpen`].
    pub fn is_not_open(&self) -> bool {
        matches!(self, SqliteError::NotOpen)
    }

    /// Primary SQLite result code, looking through migration failures.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            SqliteError::DatabaseError(rusqlite::Error::SqliteFailure(err, _)) => Some(err.code),
            SqliteError::MigrationError { source, .. } => source.sqlite_code(),
            _ => None,
        }
    }
}

impl From<tokio_rusqlite::Error> for SqliteError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        match e {
            tokio_rusqlite::Error::Rusqlite(e) => SqliteError::DatabaseError(e),
            tokio_rusqlite::Error::Close((_, e)) => SqliteError::DatabaseError(e),
            tokio_rusqlite::Error::ConnectionClosed => {
                SqliteError::ConnectionError("connection closed".to_string())
            }
            other => SqliteError::ConnectionError(other.to_string()),
        }
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(SqliteError::NotOpen.code(), "NOT_OPEN");
        assert!(SqliteError::NotOpen.is_not_open());
        assert!(!SqliteError::InvalidPragma("x".into()).is_not_open());
        let mismatch = SqliteError::VersionMismatch { expected: 2, found: 1 };
        assert_eq!(mismatch.code(), "VERSION_MISMATCH");
        assert_eq!(
            mismatch.to_string(),
            "user_version is 1 after applying migration, expected 2"
        );
    }

    #[test]
    fn test_sqlite_code_through_migration_error() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        let err = SqliteError::MigrationError {
            version: 3,
            source: Box::new(SqliteError::DatabaseError(inner)),
        };
        assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ConstraintViolation));
        assert_eq!(err.code(), "MIGRATION_FAILED");
        assert!(err.to_string().starts_with("migration 3 failed"));
    }
}
