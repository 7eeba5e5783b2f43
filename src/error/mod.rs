use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Session persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Langbase API call failed.
    #[error("Langbase error: {0}")]
    Langbase(#[from] LangbaseError),

    /// Report generation failed.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Console or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened.
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    /// A statement failed or returned unexpected data.
    #[error("Query failed: {message}")]
    Query { message: String },

    /// No stored session has this ID.
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Embedded migrations failed.
    #[error("Migration failed: {message}")]
    Migration { message: String },

    /// A stored session document does not deserialize.
    #[error("Session document is corrupt: {0}")]
    Document(#[from] serde_json::Error),

    /// Raw driver error.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Langbase API errors
#[derive(Debug, Error)]
pub enum LangbaseError {
    /// Non-success HTTP status with the response body.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// The request exceeded the configured timeout.
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors while producing an interview question
#[derive(Debug, Error)]
pub enum DialogueError {
    /// The stream could not be opened.
    #[error("Dialogue engine call failed: {0}")]
    Engine(#[from] LangbaseError),

    /// The stream was abandoned before its end marker.
    #[error("Question stream ended early after {fragments} fragments")]
    Interrupted { fragments: usize },
}

/// Report generation errors
#[derive(Debug, Error)]
pub enum ReportError {
    /// A configured font could not be loaded.
    #[error("Report resource unavailable: {} ({message})", path.display())]
    ResourceUnavailable { path: PathBuf, message: String },

    /// The session has no synthesis to report on.
    #[error("Report has no synthesis yet")]
    MissingSynthesis,

    /// The PDF backend failed.
    #[error("PDF rendering failed: {message}")]
    Render { message: String },

    /// Console or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for Langbase operations
pub type LangbaseResult<T> = Result<T, LangbaseError>;

/// Result type alias for report operations
pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Database connection failed: failed to connect");

        let err = StorageError::SessionNotFound {
            session_id: "sess-123".to_string(),
        };
        assert_eq!(err.to_string(), "Session not found: sess-123");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_langbase_error_display() {
        let err = LangbaseError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - unauthorized");

        let err = LangbaseError::InvalidResponse {
            message: "malformed JSON".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: malformed JSON");

        let err = LangbaseError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_dialogue_error_display() {
        let err = DialogueError::Interrupted { fragments: 3 };
        assert_eq!(
            err.to_string(),
            "Question stream ended early after 3 fragments"
        );

        let err: DialogueError = LangbaseError::Timeout { timeout_ms: 10 }.into();
        assert!(matches!(err, DialogueError::Engine(_)));
    }

    #[test]
    fn test_report_error_display() {
        let err = ReportError::ResourceUnavailable {
            path: PathBuf::from("/fonts/NotoSansJP.ttf"),
            message: "No such file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Report resource unavailable: /fonts/NotoSansJP.ttf (No such file)"
        );
        assert_eq!(
            ReportError::MissingSynthesis.to_string(),
            "Report has no synthesis yet"
        );
    }

    #[test]
    fn test_error_conversions_to_app_error() {
        let app_err: AppError = StorageError::SessionNotFound {
            session_id: "test-123".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Storage(_)));

        let app_err: AppError = LangbaseError::Timeout { timeout_ms: 1000 }.into();
        assert!(matches!(app_err, AppError::Langbase(_)));

        let app_err: AppError = ReportError::MissingSynthesis.into();
        assert!(matches!(app_err, AppError::Report(_)));

        let app_err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(app_err, AppError::Io(_)));
    }
}
