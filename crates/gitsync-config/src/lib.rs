//! Configuration for git-sync
//!
//! Loads the task list, validates it into immutable [`Target`] descriptors
//! and resolves credentials when a transfer needs them.

pub mod auth;
pub mod config;
pub mod error;
pub mod secret;
pub mod target;

pub use auth::{Auth, AuthConfig, BasicAuth, WireAuth};
pub use config::{Config, ConfigStore, load_targets};
pub use error::{CredentialComponent, Error, Result};
pub use secret::{Secret, SecretSource, SecretValueFrom};
pub use target::{
    DEFAULT_INTERVAL_SECONDS, DEFAULT_REMOTE_NAME, MIN_INTERVAL_SECONDS, Reference,
    ReferenceConfig, Target, TaskConfig, normalize_interval,
};
