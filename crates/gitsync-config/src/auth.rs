//! Credential resolution and rendering.
//!
//! The YAML `auth` mapping has three optional keys; at most one may be set.
//! [`AuthConfig::validate`] turns it into the [`Auth`] sum type and
//! [`Auth::render`] resolves the secrets into a [`WireAuth`] that both
//! transfer backends understand.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::CredentialComponent;
use crate::{Error, Result, Secret};

/// Raw `auth` mapping as written in the task configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<Secret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_token: Option<Secret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicAuth>,
}

/// Username and password pair for HTTP basic auth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Secret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
}

/// Validated authentication mode of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    BearerToken(Secret),
    /// `Authorization: Basic base64(":" + token)`
    BasicToken(Secret),
    /// `Authorization: Basic base64(user + ":" + password)`
    Basic(BasicAuth),
}

impl AuthConfig {
    /// Validate the mapping and collapse it into at most one [`Auth`] mode.
    pub fn validate(&self) -> Result<Option<Auth>> {
        let configured = [
            self.bearer_token.is_some(),
            self.basic_token.is_some(),
            self.basic.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if configured > 1 {
            return Err(Error::invalid_auth(
                "auth",
                "too many configurations; set only one of bearerToken, basicToken, basic",
            ));
        }

        if let Some(token) = &self.bearer_token {
            token.validate("auth.bearerToken")?;
            return Ok(Some(Auth::BearerToken(token.clone())));
        }

        if let Some(token) = &self.basic_token {
            token.validate("auth.basicToken")?;
            return Ok(Some(Auth::BasicToken(token.clone())));
        }

        if let Some(basic) = &self.basic {
            let user = basic
                .user
                .as_ref()
                .ok_or_else(|| Error::invalid_auth("auth.basic", "user is not set"))?;
            let password = basic
                .password
                .as_ref()
                .ok_or_else(|| Error::invalid_auth("auth.basic", "password is not set"))?;
            user.validate("auth.basic.user")?;
            password.validate("auth.basic.password")?;
            return Ok(Some(Auth::Basic(basic.clone())));
        }

        Ok(None)
    }
}

impl Auth {
    /// Resolve secrets and render the transport-level credential.
    pub fn render(&self) -> Result<WireAuth> {
        match self {
            Auth::BearerToken(token) => Ok(WireAuth::Header(format!("Bearer {}", token.resolve()?))),
            Auth::BasicToken(token) => {
                let encoded = STANDARD.encode(format!(":{}", token.resolve()?));
                Ok(WireAuth::Header(format!("Basic {}", encoded)))
            }
            Auth::Basic(basic) => {
                let user = basic.user.as_ref().ok_or(Error::MissingCredentialComponent {
                    component: CredentialComponent::User,
                })?;
                let user = user.resolve()?;

                let password = basic.password.as_ref().ok_or(Error::MissingCredentialComponent {
                    component: CredentialComponent::Password,
                })?;
                let password = password.resolve()?;

                Ok(WireAuth::UserPassword { user, password })
            }
        }
    }

    /// Short label for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Auth::BearerToken(_) => "bearer-token",
            Auth::BasicToken(_) => "basic-token",
            Auth::Basic(_) => "basic",
        }
    }
}

/// Resolved credential in the form a transfer backend consumes.
#[derive(Clone, PartialEq, Eq)]
pub enum WireAuth {
    /// Value of the `Authorization` header, e.g. `Bearer abc`.
    Header(String),
    /// Credential pair for a native username/password hook.
    UserPassword { user: String, password: String },
}

impl WireAuth {
    /// Value of the `Authorization` header for this credential.
    pub fn authorization(&self) -> String {
        match self {
            WireAuth::Header(value) => value.clone(),
            WireAuth::UserPassword { user, password } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
            }
        }
    }

    /// Full header line, `Authorization: <value>`.
    pub fn header(&self) -> String {
        format!("Authorization: {}", self.authorization())
    }
}

impl fmt::Debug for WireAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireAuth::Header(_) => f.write_str("WireAuth::Header(<redacted>)"),
            WireAuth::UserPassword { user, .. } => f
                .debug_struct("WireAuth::UserPassword")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
