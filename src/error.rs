/// Unified error types for the account module
use thiserror::Error;

/// Main error type for account operations
#[derive(Error, Debug)]
pub enum AccountError {
    /// Database errors, surfaced unmodified from the store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A signup code or invitation email already exists
    #[error("Signup code or email already exists")]
    AlreadyExists,

    /// Signup code is absent, exhausted, or expired. The cause is
    /// deliberately not distinguishable by callers.
    #[error("Invalid signup code")]
    InvalidCode,

    /// An account timezone value that is not a known IANA zone
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Email delivery errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for account operations
pub type AccountResult<T> = Result<T, AccountError>;
