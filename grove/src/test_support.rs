//! Test-only helpers: a recording git provider and workspace fixtures.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::io::git::{GitProvider, GitPullResult, GitPushResult, GitStatus, StatusEntry};
use crate::io::init::{InitOptions, init_workspace};
use crate::io::manifest::{ConfigProvider, FileManifests, MANIFEST_FILE};
use crate::tree::{NodeDefinition, WorkspaceTree};
use crate::workspace::Workspace;

/// Build a manifest document.
pub fn manifest(name: &str, repos_dir: &str, nodes: Vec<NodeDefinition>) -> WorkspaceTree {
    WorkspaceTree::new(name, repos_dir).with_nodes(nodes)
}

/// One recorded call on [`FakeGit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Clone { url: String, dest: PathBuf },
    Pull(PathBuf),
    Push(PathBuf),
    Status(PathBuf),
    Remotes(PathBuf),
    CurrentBranch(PathBuf),
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<GitCall>,
    fail_clone: Vec<String>,
    fail_pull: Vec<String>,
    fail_push: Vec<String>,
    dirty: Vec<String>,
    manifests: Vec<(String, WorkspaceTree)>,
}

/// Recording git provider.
///
/// Nodes are matched by the last component(s) of their directory, so
/// `fail_pull("api")` fails pulls in any directory ending in `api`. Clones
/// create the destination with an empty `.git/`. Clones share their log.
#[derive(Debug, Clone, Default)]
pub struct FakeGit {
    state: Rc<RefCell<FakeState>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_clone(self, name: &str) -> Self {
        self.state.borrow_mut().fail_clone.push(name.to_string());
        self
    }

    pub fn fail_pull(self, name: &str) -> Self {
        self.state.borrow_mut().fail_pull.push(name.to_string());
        self
    }

    pub fn fail_push(self, name: &str) -> Self {
        self.state.borrow_mut().fail_push.push(name.to_string());
        self
    }

    /// Report uncommitted changes for `name`.
    pub fn dirty(self, name: &str) -> Self {
        self.state.borrow_mut().dirty.push(name.to_string());
        self
    }

    /// Write `tree` as `grove.yaml` into `name` when it is cloned.
    pub fn with_manifest(self, name: &str, tree: WorkspaceTree) -> Self {
        self.state
            .borrow_mut()
            .manifests
            .push((name.to_string(), tree));
        self
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.state.borrow().calls.clone()
    }

    pub fn cloned(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GitCall::Clone { dest, .. } => Some(dest),
                _ => None,
            })
            .collect()
    }

    pub fn pulled(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GitCall::Pull(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GitCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn matches(names: &[String], path: &Path) -> bool {
        names.iter().any(|name| path.ends_with(name))
    }
}

impl GitProvider for FakeGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(GitCall::Clone {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        });
        let state = self.state.borrow();
        if Self::matches(&state.fail_clone, dest) {
            bail!("fatal: repository '{url}' not found");
        }
        fs::create_dir_all(dest.join(".git"))
            .with_context(|| format!("create {}", dest.display()))?;
        if let Some((_, tree)) = state
            .manifests
            .iter()
            .find(|(name, _)| dest.ends_with(name))
        {
            FileManifests.save(&dest.join(MANIFEST_FILE), tree)?;
        }
        Ok(())
    }

    fn pull(&self, path: &Path) -> Result<GitPullResult> {
        self.record(GitCall::Pull(path.to_path_buf()));
        if Self::matches(&self.state.borrow().fail_pull, path) {
            bail!("fatal: Not possible to fast-forward, aborting.");
        }
        Ok(GitPullResult {
            updated: false,
            summary: "Already up to date.".to_string(),
        })
    }

    fn push(&self, path: &Path) -> Result<GitPushResult> {
        self.record(GitCall::Push(path.to_path_buf()));
        if Self::matches(&self.state.borrow().fail_push, path) {
            bail!("error: failed to push some refs");
        }
        Ok(GitPushResult {
            pushed: true,
            summary: "main -> main".to_string(),
        })
    }

    fn status(&self, path: &Path) -> Result<GitStatus> {
        self.record(GitCall::Status(path.to_path_buf()));
        let entries = if Self::matches(&self.state.borrow().dirty, path) {
            vec![StatusEntry {
                code: " M".to_string(),
                path: "README.md".to_string(),
            }]
        } else {
            Vec::new()
        };
        Ok(GitStatus {
            branch: "main".to_string(),
            ahead: 0,
            behind: 0,
            entries,
        })
    }

    fn remotes(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        self.record(GitCall::Remotes(path.to_path_buf()));
        Ok(BTreeMap::new())
    }

    fn current_branch(&self, path: &Path) -> Result<String> {
        self.record(GitCall::CurrentBranch(path.to_path_buf()));
        Ok("main".to_string())
    }
}

/// Initialized workspace in a temp directory.
pub struct TestWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    /// `grove init` plus `root_manifest` written as the root `grove.yaml`.
    pub fn new(root_manifest: &WorkspaceTree) -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let root = temp
            .path()
            .canonicalize()
            .context("canonicalize temp dir")?;
        let paths = init_workspace(
            &root,
            &InitOptions {
                name: Some(root_manifest.name().to_string()),
                force: false,
            },
        )?;
        FileManifests.save(&paths.manifest_path, root_manifest)?;
        Ok(Self { _temp: temp, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `tree` at `rel` (relative to the root), creating directories.
    pub fn write_manifest(&self, rel: &str, tree: &WorkspaceTree) -> Result<PathBuf> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        FileManifests.save(&path, tree)?;
        Ok(path)
    }

    pub fn mkdir(&self, rel: &str) -> Result<PathBuf> {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(path)
    }

    pub fn open(&self, git: FakeGit) -> Result<Workspace<FakeGit, FileManifests>> {
        Workspace::open(&self.root, git, FileManifests)
    }
}
