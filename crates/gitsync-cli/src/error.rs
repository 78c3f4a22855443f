//! Error types for git-sync

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that end the process
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] gitsync_config::Error),

    /// First unrecovered error from a job
    #[error(transparent)]
    Scheduler(#[from] gitsync_scheduler::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to configure logging: {message}")]
    Logging { message: String },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
