//! Secret values referenced by auth configuration.
//!
//! A secret is written as either `{ value: ... }` or
//! `{ valueFrom: { env: ... } }` / `{ valueFrom: { file: ... } }`.
//! Validation insists on exactly one source. Resolution is tolerant and walks
//! file, env and literal in that order, so a record that bypassed validation
//! still resolves to the first source that yields a value.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single credential value and where to read it from.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Secret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<SecretValueFrom>,
}

/// Indirect secret sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretValueFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// One populated source of a [`Secret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource<'a> {
    File(&'a Path),
    Env(&'a str),
    Literal(&'a str),
}

impl Secret {
    /// Secret given inline in the configuration.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            value_from: None,
        }
    }

    /// Secret read from an environment variable at use time.
    pub fn from_env(name: impl Into<String>) -> Self {
        Self {
            value: None,
            value_from: Some(SecretValueFrom {
                env: Some(name.into()),
                file: None,
            }),
        }
    }

    /// Secret read from a file at use time.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            value: None,
            value_from: Some(SecretValueFrom {
                env: None,
                file: Some(path.into()),
            }),
        }
    }

    /// Populated sources in resolution order. Empty strings count as unset.
    pub fn sources(&self) -> Vec<SecretSource<'_>> {
        let mut sources = Vec::with_capacity(3);
        if let Some(from) = &self.value_from {
            if let Some(file) = from.file.as_deref().filter(|f| !f.as_os_str().is_empty()) {
                sources.push(SecretSource::File(file));
            }
            if let Some(env) = from.env.as_deref().filter(|e| !e.is_empty()) {
                sources.push(SecretSource::Env(env));
            }
        }
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            sources.push(SecretSource::Literal(value));
        }
        sources
    }

    /// Check that exactly one source is configured.
    ///
    /// `location` names the secret in error messages, e.g. `auth.basic.user`.
    pub fn validate(&self, location: &str) -> Result<()> {
        match self.sources().len() {
            1 => Ok(()),
            0 => Err(Error::invalid_auth(
                location,
                "secret has no source; set one of value, valueFrom.env, valueFrom.file",
            )),
            _ => Err(Error::invalid_auth(
                location,
                "secret sources value, valueFrom.env and valueFrom.file cannot be set simultaneously",
            )),
        }
    }

    /// Resolve the secret to its string value.
    ///
    /// A source that fails does not end resolution; the next one is tried.
    /// File contents are returned verbatim.
    pub fn resolve(&self) -> Result<String> {
        let mut failure = None;

        for source in self.sources() {
            match source {
                SecretSource::File(path) => match std::fs::read_to_string(path) {
                    Ok(contents) => return Ok(contents),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "secret file unreadable, trying next source");
                        failure.get_or_insert_with(|| {
                            format!("cannot read secret file {}: {}", path.display(), e)
                        });
                    }
                },
                SecretSource::Env(name) => match std::env::var(name) {
                    Ok(value) => return Ok(value),
                    Err(_) => {
                        tracing::debug!(env = %name, "secret env variable not set, trying next source");
                        failure.get_or_insert_with(|| format!("env variable {} is not set", name));
                    }
                },
                SecretSource::Literal(value) => return Ok(value.to_string()),
            }
        }

        Err(Error::SecretResolution {
            message: failure.unwrap_or_else(|| "secret bad configuration".to_string()),
        })
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("value_from", &self.value_from)
            .finish()
    }
}
