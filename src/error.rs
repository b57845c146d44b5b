/// Failures raised by a [`crate::source::MessageSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Message source unavailable: {0}")]
    Unavailable(String),
    #[error("No message at index {0}")]
    NotFound(usize),
    #[error("Malformed message at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
}

/// Failures raised by a [`crate::store::RecordStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Message already stored: {0}")]
    Duplicate(String),
    #[error("Record store error: {0}")]
    Backend(String),
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Duplicate(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Startup-time configuration problems. Never raised once the loop runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}
