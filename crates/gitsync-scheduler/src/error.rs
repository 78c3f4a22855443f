//! Error types for gitsync-scheduler

/// Error returned by a job.
pub type JobError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of one job invocation.
pub type JobResult = std::result::Result<(), JobError>;

/// What the shared error channel carries
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Job '{job}' failed: {source}")]
    Job {
        job: String,
        #[source]
        source: JobError,
    },

    #[error("Job '{job}' did not complete: {message}")]
    Join { job: String, message: String },

    /// Clean completion; not a failure.
    #[error("app finished successfully")]
    Finished,
}

impl Error {
    /// Whether this is the clean-completion sentinel.
    pub fn is_finished(&self) -> bool {
        matches!(self, Error::Finished)
    }
}
