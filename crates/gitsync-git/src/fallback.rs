//! Fallback transfer through the `git` executable
//!
//! Used when the in-process clone fails for a reason other than an already
//! present repository. The subprocess leaves no in-process handle, so the
//! engine reattaches to whatever it produced.

use std::path::PathBuf;
use std::process::Command;

use gitsync_config::{DEFAULT_REMOTE_NAME, Reference, Target, WireAuth};

const AUTH_HEADER_CONFIG: &str = "http.extraHeader=Authorization: ";

/// Errors from the fallback transfer.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} clone failed (exit code {code}): {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },
}

/// External version-control client used as a second transfer tier.
pub trait FallbackTransport: Send + Sync {
    /// Clone the target into its path. `auth` is the rendered credential.
    fn clone_repository(&self, target: &Target, auth: Option<&WireAuth>) -> Result<(), FallbackError>;
}

/// Runs `git clone` as a subprocess.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl FallbackTransport for GitCommand {
    fn clone_repository(&self, target: &Target, auth: Option<&WireAuth>) -> Result<(), FallbackError> {
        let program = self.program.display().to_string();
        let args = clone_args(target, auth);

        tracing::debug!(
            name = %target.name(),
            url = %target.url(),
            path = %target.path().display(),
            command = %format!("{} {}", program, redact_args(&args).join(" ")),
            "running git clone"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|source| FallbackError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            let line = line.trim_matches(['\r', '\n']);
            if !line.is_empty() {
                tracing::debug!(
                    name = %target.name(),
                    url = %target.url(),
                    path = %target.path().display(),
                    "{}",
                    line
                );
            }
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(FallbackError::Exit {
                program,
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// Arguments for `git clone` equivalent to the library clone of `target`.
pub fn clone_args(target: &Target, auth: Option<&WireAuth>) -> Vec<String> {
    let mut args = vec!["clone".to_string()];

    if target.insecure() {
        args.extend(["-c".to_string(), "http.sslVerify=false".to_string()]);
    }
    if target.depth() > 0 {
        args.extend(["--depth".to_string(), target.depth().to_string()]);
    }
    if target.submodules() {
        args.push("--recurse-submodules".to_string());
    }
    if target.progress() {
        args.push("--progress".to_string());
    }
    match target.single_branch() {
        Some(true) => args.push("--single-branch".to_string()),
        Some(false) => args.push("--no-single-branch".to_string()),
        None => {}
    }
    match target.reference() {
        Reference::Branch(name) | Reference::Tag(name) => {
            args.extend(["--branch".to_string(), name.clone()]);
        }
        Reference::Default => {}
    }
    if target.remote_name() != DEFAULT_REMOTE_NAME {
        args.extend(["--origin".to_string(), target.remote_name().to_string()]);
    }
    if let Some(auth) = auth {
        args.extend([
            "-c".to_string(),
            format!("{}{}", AUTH_HEADER_CONFIG, auth.authorization()),
        ]);
    }

    args.push(target.url().to_string());
    args.push(target.path().display().to_string());
    args
}

/// Copy of `args` with the authorization header value masked.
pub fn redact_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            if arg.starts_with(AUTH_HEADER_CONFIG) {
                format!("{}<redacted>", AUTH_HEADER_CONFIG)
            } else {
                arg.clone()
            }
        })
        .collect()
}
