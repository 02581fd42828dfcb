use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("offline: network-dependent work is suspended until connectivity returns")]
    Offline,
    #[error("illegal transition: cannot {action} a booking that is {from}")]
    IllegalTransition { from: String, action: String },
}

impl InfraError {
    /// Transport failures and server-side (5xx) failures may succeed on a
    /// later attempt; client errors never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            InfraError::Transport(_) => true,
            InfraError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
