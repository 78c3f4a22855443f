//! Error types for gitsync-git

use std::path::PathBuf;

/// Result type for gitsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while acquiring or pulling a target
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Credentials(#[from] gitsync_config::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git repo url is missing")]
    EmptyUrl,

    #[error("Target directory (path) is not set")]
    EmptyPath,

    #[error("Git repo url '{url}' is not valid")]
    InvalidUrl { url: String },

    #[error("Git repo url scheme '{scheme}' is not supported")]
    UnsupportedUrlScheme { scheme: String },

    #[error("Unable to clone {url} into {path}: {message}")]
    CloneFailed {
        url: String,
        path: PathBuf,
        message: String,
    },

    #[error("Unable to attach to the git repo at {path}: {source}")]
    AttachFailed {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Local reference {local} and target reference {target} are different")]
    ReferenceMismatch { local: String, target: String },

    #[error("Task '{name}' is not attached to a repository")]
    NotAttached { name: String },

    #[error("Pull failed: {message}")]
    PullFailed { message: String },

    #[error("Cannot fast-forward {reference} from {local} to {remote}")]
    NonFastForward {
        reference: String,
        local: String,
        remote: String,
    },
}

/// Failure classes used for logging and propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid target description; never retried.
    Configuration,
    /// A secret could not be resolved when it was needed.
    Resolution,
    /// Clone, fetch or fallback process failure.
    Transfer,
    /// The local path disagrees with the configuration.
    StateConsistency,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyUrl
            | Error::EmptyPath
            | Error::InvalidUrl { .. }
            | Error::UnsupportedUrlScheme { .. } => ErrorKind::Configuration,
            Error::Credentials(e) if e.is_resolution() => ErrorKind::Resolution,
            Error::Credentials(_) => ErrorKind::Configuration,
            Error::Git(_)
            | Error::CloneFailed { .. }
            | Error::PullFailed { .. }
            | Error::NonFastForward { .. } => ErrorKind::Transfer,
            Error::Io { .. }
            | Error::AttachFailed { .. }
            | Error::ReferenceMismatch { .. }
            | Error::NotAttached { .. } => ErrorKind::StateConsistency,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Transfer => "transfer",
            ErrorKind::StateConsistency => "state-consistency",
        };
        f.write_str(label)
    }
}
