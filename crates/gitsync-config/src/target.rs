//! Task configuration and the validated [`Target`] descriptor.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Auth, AuthConfig, Error, Result};

/// Interval used when `intervalSeconds` is unset or not positive.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;

/// Shortest allowed pull interval.
pub const MIN_INTERVAL_SECONDS: u64 = 20;

/// Remote name used when `remoteName` is unset.
pub const DEFAULT_REMOTE_NAME: &str = "origin";

/// One entry of the `tasks` list, as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub path: PathBuf,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub depth: i64,

    #[serde(default)]
    pub submodules: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,

    #[serde(default)]
    pub reference: ReferenceConfig,

    #[serde(default)]
    pub run_once: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<i64>,

    #[serde(default)]
    pub force: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_branch: Option<bool>,

    #[serde(default)]
    pub progress: bool,
}

/// Raw `reference` mapping: `{ branch: ... }`, `{ tag: ... }` or `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Desired remote reference of a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Whatever the remote's default branch is.
    #[default]
    Default,
    Branch(String),
    Tag(String),
}

impl Reference {
    /// Fully qualified reference name, e.g. `refs/heads/main`.
    pub fn full_name(&self) -> Option<String> {
        match self {
            Reference::Default => None,
            Reference::Branch(branch) => Some(format!("refs/heads/{}", branch)),
            Reference::Tag(tag) => Some(format!("refs/tags/{}", tag)),
        }
    }

    /// Branch or tag name as configured.
    pub fn short_name(&self) -> Option<&str> {
        match self {
            Reference::Default => None,
            Reference::Branch(name) | Reference::Tag(name) => Some(name),
        }
    }

    /// Whether the reference may be used to select what a pull fetches.
    ///
    /// Names ending in `head` (any case) point at a symbolic ref and are
    /// treated like an unset reference.
    pub fn is_pullable(&self) -> bool {
        self.short_name()
            .is_some_and(|name| !name.to_lowercase().ends_with("head"))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.full_name() {
            Some(name) => f.write_str(&name),
            None => f.write_str("<default>"),
        }
    }
}

impl TryFrom<&ReferenceConfig> for Reference {
    type Error = ();

    fn try_from(config: &ReferenceConfig) -> std::result::Result<Self, ()> {
        let tag = config.tag.as_deref().filter(|t| !t.is_empty());
        let branch = config.branch.as_deref().filter(|b| !b.is_empty());
        match (branch, tag) {
            (Some(_), Some(_)) => Err(()),
            (Some(branch), None) => Ok(Reference::Branch(branch.to_string())),
            (None, Some(tag)) => Ok(Reference::Tag(tag.to_string())),
            (None, None) => Ok(Reference::Default),
        }
    }
}

/// Validated, immutable description of one synchronization target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    url: String,
    path: PathBuf,
    reference: Reference,
    depth: u32,
    submodules: bool,
    single_branch: Option<bool>,
    remote_name: String,
    force: bool,
    interval: Duration,
    run_once: bool,
    insecure: bool,
    progress: bool,
    auth: Option<Auth>,
}

impl Target {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// History depth; 0 means full history.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn submodules(&self) -> bool {
        self.submodules
    }

    pub fn single_branch(&self) -> Option<bool> {
        self.single_branch
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Whether an existing path may be wiped before acquisition.
    pub fn force(&self) -> bool {
        self.force
    }

    /// Fixed delay between pulls, never below [`MIN_INTERVAL_SECONDS`].
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn run_once(&self) -> bool {
        self.run_once
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    pub fn progress(&self) -> bool {
        self.progress
    }

    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }
}

impl TaskConfig {
    /// Minimal task; every optional field keeps its default.
    pub fn new(name: impl Into<String>, url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Validate this entry in isolation and build its [`Target`].
    ///
    /// Uniqueness across tasks is checked by [`crate::Config::validate`].
    pub fn validate(&self) -> Result<Target> {
        if self.name.is_empty() {
            return Err(Error::NameMissing);
        }
        let task = self.name.clone();

        if self.path.as_os_str().is_empty() {
            return Err(Error::PathMissing { task });
        }

        if self.url.is_empty() {
            return Err(Error::UrlMissing { task });
        }
        let scheme = url_scheme(&self.url).ok_or_else(|| Error::UrlInvalid {
            task: task.clone(),
            url: self.url.clone(),
        })?;
        if !is_supported_scheme(&scheme) {
            return Err(Error::UrlSchemeUnsupported { task, scheme });
        }

        let reference = Reference::try_from(&self.reference)
            .map_err(|_| Error::ConflictingReference { task: task.clone() })?;

        let depth = u32::try_from(self.depth).map_err(|_| Error::NegativeDepth {
            task: task.clone(),
            depth: self.depth,
        })?;

        let auth = match &self.auth {
            Some(auth) => auth.validate().map_err(|e| match e {
                Error::InvalidAuth { location, message } => Error::InvalidAuth {
                    location: format!("task '{}' {}", task, location),
                    message,
                },
                other => other,
            })?,
            None => None,
        };

        let remote_name = self
            .remote_name
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE_NAME.to_string());

        Ok(Target {
            name: self.name.clone(),
            url: self.url.clone(),
            path: self.path.clone(),
            reference,
            depth,
            submodules: self.submodules,
            single_branch: self.single_branch,
            remote_name,
            force: self.force,
            interval: normalize_interval(self.interval_seconds),
            run_once: self.run_once,
            insecure: self.insecure,
            progress: self.progress,
            auth,
        })
    }
}

/// Apply the interval default and floor.
///
/// Unset or non-positive values become [`DEFAULT_INTERVAL_SECONDS`]; anything
/// below [`MIN_INTERVAL_SECONDS`] is raised to it.
pub fn normalize_interval(seconds: Option<i64>) -> Duration {
    let seconds = match seconds {
        Some(s) if s > 0 => (s as u64).max(MIN_INTERVAL_SECONDS),
        _ => DEFAULT_INTERVAL_SECONDS,
    };
    Duration::from_secs(seconds)
}

/// Lower-cased scheme of a URL, or `None` if the URL has no `scheme://` prefix.
pub fn url_scheme(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        || rest.is_empty()
        || rest.chars().any(char::is_whitespace)
    {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// Only http and https remotes are synchronized.
pub fn is_supported_scheme(scheme: &str) -> bool {
    matches!(scheme, "http" | "https")
}
