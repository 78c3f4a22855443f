//! Error types for gitsync-config

use std::path::PathBuf;

/// Result type for gitsync-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, validating or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Task name is missing")]
    NameMissing,

    #[error("Task name '{name}' is not unique")]
    NameNotUnique { name: String },

    #[error("Task '{task}': path is missing")]
    PathMissing { task: String },

    #[error("Task '{task}': path '{path}' is not unique")]
    PathNotUnique { task: String, path: PathBuf },

    #[error("Task '{task}': git repo url is missing")]
    UrlMissing { task: String },

    #[error("Task '{task}': git repo url '{url}' is not valid")]
    UrlInvalid { task: String, url: String },

    #[error("Task '{task}': git repo url scheme '{scheme}' is not supported (expected http or https)")]
    UrlSchemeUnsupported { task: String, scheme: String },

    #[error("Task '{task}': branch and tag cannot be configured simultaneously")]
    ConflictingReference { task: String },

    #[error("Task '{task}': depth cannot be negative ({depth})")]
    NegativeDepth { task: String, depth: i64 },

    #[error("Invalid auth configuration at {location}: {message}")]
    InvalidAuth { location: String, message: String },

    #[error("Secret could not be resolved: {message}")]
    SecretResolution { message: String },

    #[error("Basic auth {component} is not configured")]
    MissingCredentialComponent { component: CredentialComponent },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_auth(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAuth {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether this error is detected lazily, when a credential is actually needed.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::SecretResolution { .. } | Error::MissingCredentialComponent { .. }
        )
    }
}

/// The part of a basic credential that was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialComponent {
    User,
    Password,
}

impl std::fmt::Display for CredentialComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialComponent::User => write!(f, "user"),
            CredentialComponent::Password => write!(f, "password"),
        }
    }
}
