//! Transfer options derived from a target.

use std::path::PathBuf;

use git2::{CertificateCheckStatus, Cred, FetchOptions, RemoteCallbacks};
use gitsync_config::{Reference, Target, WireAuth};

use crate::Result;

/// Everything a transfer backend needs for one clone or fetch.
///
/// Built fresh for every operation so secrets are resolved at use time.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub name: String,
    pub url: String,
    pub path: PathBuf,
    pub remote_name: String,
    pub reference: Reference,
    pub depth: u32,
    pub single_branch: Option<bool>,
    pub submodules: bool,
    pub insecure: bool,
    pub progress: bool,
    pub auth: Option<WireAuth>,
}

impl TransferOptions {
    /// Derive options from a target, rendering its credentials.
    pub fn from_target(target: &Target) -> Result<Self> {
        let auth = match target.auth() {
            Some(auth) => Some(auth.render()?),
            None => None,
        };

        Ok(Self {
            name: target.name().to_string(),
            url: target.url().to_string(),
            path: target.path().to_path_buf(),
            remote_name: target.remote_name().to_string(),
            reference: target.reference().clone(),
            depth: target.depth(),
            single_branch: target.single_branch(),
            submodules: target.submodules(),
            insecure: target.insecure(),
            progress: target.progress(),
            auth,
        })
    }

    /// Fetch refspec restricting the initial clone to one branch.
    ///
    /// Only applies when single-branch mode is on and a branch is configured.
    pub fn clone_refspec(&self) -> Option<String> {
        match (&self.reference, self.single_branch) {
            (Reference::Branch(branch), Some(true)) => Some(branch_refspec(&self.remote_name, branch)),
            _ => None,
        }
    }

    /// libgit2 fetch options carrying auth, TLS policy, depth and progress.
    pub fn fetch_options(&self) -> FetchOptions<'_> {
        let mut callbacks = RemoteCallbacks::new();

        if self.insecure {
            callbacks.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
        }

        if let Some(WireAuth::UserPassword { user, password }) = &self.auth {
            let mut attempts = 0u8;
            callbacks.credentials(move |_url, _username, _allowed| {
                attempts += 1;
                if attempts > 1 {
                    return Err(git2::Error::from_str("credentials were rejected by the remote"));
                }
                Cred::userpass_plaintext(user, password)
            });
        }

        if self.progress {
            let (name, url) = (self.name.as_str(), self.url.as_str());
            callbacks.sideband_progress(move |data| {
                let text = String::from_utf8_lossy(data);
                let text = text.trim();
                if !text.is_empty() {
                    tracing::debug!(name = %name, url = %url, "{}", text);
                }
                true
            });
            callbacks.transfer_progress(move |stats| {
                if stats.total_objects() > 0 && stats.indexed_objects() == stats.total_objects() {
                    tracing::debug!(
                        name = %name,
                        url = %url,
                        objects = stats.total_objects(),
                        bytes = stats.received_bytes(),
                        "objects received"
                    );
                }
                true
            });
        }

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        if self.depth > 0 {
            fetch.depth(i32::try_from(self.depth).unwrap_or(i32::MAX));
        }

        if let Some(auth @ WireAuth::Header(_)) = &self.auth {
            let header = auth.header();
            fetch.custom_headers(&[header.as_str()]);
        }

        fetch
    }
}

/// `+refs/heads/<branch>:refs/remotes/<remote>/<branch>`
pub fn branch_refspec(remote_name: &str, branch: &str) -> String {
    format!("+refs/heads/{branch}:refs/remotes/{remote_name}/{branch}")
}

/// `+refs/tags/<tag>:refs/tags/<tag>`
pub fn tag_refspec(tag: &str) -> String {
    format!("+refs/tags/{tag}:refs/tags/{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsync_config::{AuthConfig, ReferenceConfig, Secret, TaskConfig};

    fn target(configure: impl FnOnce(&mut TaskConfig)) -> Target {
        let mut config = TaskConfig::new("a", "https://example.test/repo.git", "/tmp/a");
        configure(&mut config);
        config.validate().unwrap()
    }

    #[test]
    fn test_clone_refspec_only_for_single_branch() {
        let options = TransferOptions::from_target(&target(|c| {
            c.reference = ReferenceConfig {
                branch: Some("main".into()),
                tag: None,
            };
            c.single_branch = Some(true);
        }))
        .unwrap();
        assert_eq!(
            options.clone_refspec().as_deref(),
            Some("+refs/heads/main:refs/remotes/origin/main")
        );

        let options = TransferOptions::from_target(&target(|c| {
            c.reference = ReferenceConfig {
                branch: Some("main".into()),
                tag: None,
            };
        }))
        .unwrap();
        assert_eq!(options.clone_refspec(), None);
    }

    #[test]
    fn test_auth_rendered_when_options_are_built() {
        let options = TransferOptions::from_target(&target(|c| {
            c.auth = Some(AuthConfig {
                bearer_token: Some(Secret::literal("tok")),
                ..Default::default()
            });
        }))
        .unwrap();
        assert_eq!(options.auth, Some(WireAuth::Header("Bearer tok".into())));
    }

    #[test]
    fn test_unresolvable_secret_fails_lazily() {
        let target = target(|c| {
            c.auth = Some(AuthConfig {
                basic_token: Some(Secret::from_env("GITSYNC_OPTIONS_TEST_UNSET_VAR")),
                ..Default::default()
            });
        });
        let err = TransferOptions::from_target(&target).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Resolution);
    }

    #[test]
    fn test_refspecs() {
        assert_eq!(
            branch_refspec("upstream", "dev"),
            "+refs/heads/dev:refs/remotes/upstream/dev"
        );
        assert_eq!(tag_refspec("v1"), "+refs/tags/v1:refs/tags/v1");
    }
}
