//! Error types module
//!
//! `AppError` is the unified error returned to route-handler collaborators.
//! Each layer keeps its own `thiserror` enum (storage, validation, variant
//! generation, upload, serving) and converts into `AppError` at the service
//! boundary.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Caller mistakes: bad input, unknown ids
    Debug,
    /// Limits and unreadable images
    Warn,
    /// Backend or internal failures
    Error,
}

/// How an error is presented to a client.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Machine-readable code, e.g. `STORAGE_UNAVAILABLE`.
    fn error_code(&self) -> &'static str;

    /// Retrying the same request may succeed.
    fn is_recoverable(&self) -> bool;

    /// Message safe to show a client. Backend details are never included.
    fn client_message(&self) -> String;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Quota exceeded: {size} bytes exceeds the limit of {limit} bytes")]
    QuotaExceeded { size: u64, limit: u64 },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

struct Profile {
    status: u16,
    code: &'static str,
    recoverable: bool,
    /// Replace the message with `generic` when shown to a client.
    generic: Option<&'static str>,
    level: LogLevel,
}

impl AppError {
    fn profile(&self) -> Profile {
        let (status, code, recoverable, generic, level) = match self {
            AppError::Database(_) => (
                500,
                "DATABASE_ERROR",
                true,
                Some("Failed to access database"),
                LogLevel::Error,
            ),
            AppError::StorageUnavailable(_) => (
                503,
                "STORAGE_UNAVAILABLE",
                true,
                Some("Failed to access storage"),
                LogLevel::Error,
            ),
            AppError::NotFound(_) => (404, "NOT_FOUND", false, None, LogLevel::Debug),
            AppError::QuotaExceeded { .. } => (413, "QUOTA_EXCEEDED", false, None, LogLevel::Warn),
            AppError::UnsupportedFormat(_) => {
                (415, "UNSUPPORTED_FORMAT", false, None, LogLevel::Debug)
            }
            AppError::ImageProcessing(_) => {
                (422, "IMAGE_PROCESSING_ERROR", false, None, LogLevel::Warn)
            }
            AppError::Validation(_) => (400, "VALIDATION_ERROR", false, None, LogLevel::Debug),
            AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, None, LogLevel::Debug),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => (
                500,
                "INTERNAL_ERROR",
                true,
                Some("Internal server error"),
                LogLevel::Error,
            ),
        };
        Profile {
            status,
            code,
            recoverable,
            generic,
            level,
        }
    }

    /// The error followed by its `source` chain, one cause per line.
    pub fn detailed_message(&self) -> String {
        let mut causes = std::iter::successors(
            std::error::Error::source(self),
            |err: &&(dyn std::error::Error + 'static)| err.source(),
        );
        let mut details = self.to_string();
        for cause in causes.by_ref().take(5) {
            details.push_str(&format!("\n  Caused by: {}", cause));
        }
        if causes.next().is_some() {
            details.push_str("\n  ...");
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.profile().status
    }

    fn error_code(&self) -> &'static str {
        self.profile().code
    }

    fn is_recoverable(&self) -> bool {
        self.profile().recoverable
    }

    fn client_message(&self) -> String {
        if let Some(generic) = self.profile().generic {
            return generic.to_string();
        }
        match self {
            AppError::QuotaExceeded { size, limit } => format!(
                "File of {} bytes exceeds the maximum allowed size of {} bytes",
                size, limit
            ),
            AppError::NotFound(msg)
            | AppError::UnsupportedFormat(msg)
            | AppError::ImageProcessing(msg)
            | AppError::Validation(msg)
            | AppError::InvalidInput(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        self.profile().level
    }
}
