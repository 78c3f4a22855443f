//! Backends that redirect transfers to a local upstream fixture.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use git2::Repository;
use gitsync_config::{ReferenceConfig, Target, TaskConfig, WireAuth};
use gitsync_git::{
    FallbackError, FallbackTransport, SyncEngine, TransferOptions, Transport, TransportError,
    clone_from,
};
use gitsync_test_utils::Upstream;

pub const URL: &str = "https://example.test/upstream.git";

/// Library transport that clones from a local path instead of the target URL.
///
/// libgit2's local transport cannot negotiate shallow history, so the
/// requested depth is recorded and then transferred in full.
pub struct LocalTransport {
    source: String,
    clones: AtomicUsize,
    depth: AtomicU32,
}

impl LocalTransport {
    pub fn new(upstream: &Upstream) -> Arc<Self> {
        Arc::new(Self {
            source: upstream.location(),
            clones: AtomicUsize::new(0),
            depth: AtomicU32::new(0),
        })
    }

    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    /// Depth of the most recent clone or fetch.
    pub fn requested_depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }

    fn full_history(&self, options: &TransferOptions) -> TransferOptions {
        self.depth.store(options.depth, Ordering::SeqCst);
        TransferOptions {
            depth: 0,
            ..options.clone()
        }
    }
}

impl Transport for LocalTransport {
    fn clone_repository(&self, options: &TransferOptions) -> Result<Repository, TransportError> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        clone_from(&self.source, &self.full_history(options))
    }

    fn fetch(
        &self,
        repo: &Repository,
        refspecs: &[String],
        options: &TransferOptions,
    ) -> Result<(), git2::Error> {
        let options = self.full_history(options);
        let mut remote = repo.find_remote(&options.remote_name)?;
        let mut fetch_options = options.fetch_options();
        remote.fetch(refspecs, Some(&mut fetch_options), None)
    }
}

/// Library transport whose clone always fails with a generic error.
pub struct BrokenTransport;

impl Transport for BrokenTransport {
    fn clone_repository(&self, _options: &TransferOptions) -> Result<Repository, TransportError> {
        Err(TransportError::Failed(git2::Error::from_str(
            "simulated in-process transfer failure",
        )))
    }
}

/// Fallback that clones from a local path, or fails when it has none.
///
/// Every call records what the target directory held at that moment.
pub struct ScriptedFallback {
    source: Option<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl ScriptedFallback {
    pub fn cloning(upstream: &Upstream) -> Arc<Self> {
        Arc::new(Self {
            source: Some(upstream.location()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            source: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Directory listings taken at the start of each call.
    pub fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

impl FallbackTransport for ScriptedFallback {
    fn clone_repository(
        &self,
        target: &Target,
        _auth: Option<&WireAuth>,
    ) -> Result<(), FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(entries(target.path()));
        match &self.source {
            Some(source) => Repository::clone(source, target.path())
                .map(|_| ())
                .map_err(|e| FallbackError::Exit {
                    program: "git".into(),
                    code: 128,
                    stderr: e.to_string(),
                }),
            None => Err(FallbackError::Exit {
                program: "git".into(),
                code: 128,
                stderr: "fatal: simulated failure".into(),
            }),
        }
    }
}

pub fn task(path: &Path) -> TaskConfig {
    TaskConfig::new("a", URL, path)
}

pub fn branch(name: &str) -> ReferenceConfig {
    ReferenceConfig {
        branch: Some(name.into()),
        tag: None,
    }
}

pub fn tag(name: &str) -> ReferenceConfig {
    ReferenceConfig {
        branch: None,
        tag: Some(name.into()),
    }
}

/// Engine cloning from `upstream` with a fallback that must not be needed.
pub fn local_engine(upstream: &Upstream, config: &TaskConfig) -> (SyncEngine, Arc<LocalTransport>, Arc<ScriptedFallback>) {
    let transport = LocalTransport::new(upstream);
    let fallback = ScriptedFallback::failing();
    let engine = SyncEngine::with_backends(
        config.validate().unwrap(),
        transport.clone(),
        fallback.clone(),
    );
    (engine, transport, fallback)
}

/// Commit `content` to `file` directly in a local clone.
pub fn commit_locally(path: &Path, file: &str, content: &str) -> git2::Oid {
    let repo = Repository::open(path).unwrap();
    std::fs::write(path.join(file), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = git2::Signature::now("Local User", "local@test.com").unwrap();
    let parent = repo.head().unwrap().peel_to_commit().unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "local change", &tree, &[&parent])
        .unwrap()
}

pub fn workdir(root: &Path) -> PathBuf {
    root.join("work")
}

/// Sorted names directly under `path`; empty when it does not exist.
pub fn entries(path: &Path) -> Vec<String> {
    let Ok(dir) = std::fs::read_dir(path) else {
        return Vec::new();
    };
    let mut names: Vec<String> = dir
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
