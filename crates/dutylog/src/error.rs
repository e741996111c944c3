//! Error types for dutylog.
//!
//! This module defines the crate-wide error type used by storage,
//! configuration and the server, plus the outcome taxonomy of duty
//! operations that the HTTP layer maps onto status codes.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dutylog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored row could not be turned back into a duty log.
    #[error("corrupt record in duty {id}: {message}")]
    CorruptRecord {
        /// Row id of the offending duty.
        id: i64,
        /// What could not be decoded.
        message: String,
    },

    /// The storage lock was poisoned by a panicking request.
    #[error("storage unavailable: lock poisoned")]
    StoragePoisoned,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Server Errors ===
    /// The HTTP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to listen on.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for dutylog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a corrupt record error.
    #[must_use]
    pub fn corrupt_record(id: i64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            id,
            message: message.into(),
        }
    }

    /// Check if this error is a uniqueness constraint violation reported by `SQLite`.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DatabaseQuery(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Why a duty operation was refused.
///
/// Each variant corresponds to one caller-visible outcome; the `Display`
/// text is what clients see in the `error` field.
#[derive(Error, Debug)]
pub enum DutyError {
    /// The officer already has an active duty.
    #[error("User already has an active duty")]
    Conflict,

    /// The request named a post outside the fixed list.
    #[error("Invalid post selection")]
    InvalidArgument,

    /// The officer has no active duty.
    #[error("No active duty found")]
    NotFound,

    /// The active duty has no incident with the requested id.
    #[error("Incident not found")]
    IncidentNotFound,

    /// The store matched the duty but reported no modification.
    #[error("Failed to {operation}")]
    WriteFailed {
        /// What we were trying to do, e.g. `"end duty"`.
        operation: &'static str,
    },

    /// The store itself failed.
    #[error("{0}")]
    StoreUnavailable(#[from] Error),
}

/// Result type for duty operations.
pub type DutyResult<T> = std::result::Result<T, DutyError>;

impl DutyError {
    /// Create a write-failed error for the named operation.
    #[must_use]
    pub fn write_failed(operation: &'static str) -> Self {
        Self::WriteFailed { operation }
    }

    /// Check if the error was caused by the caller rather than the store.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::WriteFailed { .. } | Self::StoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");

        assert_eq!(
            Error::StoragePoisoned.to_string(),
            "storage unavailable: lock poisoned"
        );
    }

    #[test]
    fn test_corrupt_record_display() {
        let err = Error::corrupt_record(7, "unknown post: Lobby");
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("unknown post: Lobby"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(!err.is_constraint_violation());
        }
    }

    #[test]
    fn test_constraint_violation_detected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (k TEXT PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO t (k) VALUES ('a')", []).unwrap();
        let sqlite_err = conn
            .execute("INSERT INTO t (k) VALUES ('a')", [])
            .unwrap_err();

        let err: Error = sqlite_err.into();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid bind address".to_string(),
        };
        assert!(err.to_string().contains("invalid bind address"));
    }

    #[test]
    fn test_bind_error_display() {
        let err = Error::Bind {
            addr: "127.0.0.1:3000".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:3000"));
        assert!(msg.contains("address in use"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }

    #[test]
    fn test_duty_error_messages() {
        assert_eq!(
            DutyError::Conflict.to_string(),
            "User already has an active duty"
        );
        assert_eq!(DutyError::InvalidArgument.to_string(), "Invalid post selection");
        assert_eq!(DutyError::NotFound.to_string(), "No active duty found");
        assert_eq!(DutyError::IncidentNotFound.to_string(), "Incident not found");
        assert_eq!(
            DutyError::write_failed("add incident").to_string(),
            "Failed to add incident"
        );
    }

    #[test]
    fn test_store_unavailable_keeps_underlying_message() {
        let err: DutyError = Error::StoragePoisoned.into();
        assert_eq!(err.to_string(), "storage unavailable: lock poisoned");
    }

    #[test]
    fn test_duty_error_is_client_error() {
        assert!(DutyError::Conflict.is_client_error());
        assert!(DutyError::InvalidArgument.is_client_error());
        assert!(DutyError::NotFound.is_client_error());
        assert!(DutyError::IncidentNotFound.is_client_error());
        assert!(!DutyError::write_failed("end duty").is_client_error());
        assert!(!DutyError::StoreUnavailable(Error::StoragePoisoned).is_client_error());
    }
}
