//! Error types for the calsync pipeline.

use thiserror::Error;

/// Errors that can occur in calsync operations.
#[derive(Error, Debug)]
pub enum CalSyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar '{calendar}' does not belong to account '{account}'")]
    AccountMismatch { calendar: String, account: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Change stream closed")]
    StreamClosed,

    #[error("Sync session already finished; start a new session")]
    SessionFinished,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CalSyncError {
    fn from(e: serde_json::Error) -> Self {
        CalSyncError::Serialization(e.to_string())
    }
}

/// Result type alias for calsync operations.
pub type CalSyncResult<T> = Result<T, CalSyncError>;
