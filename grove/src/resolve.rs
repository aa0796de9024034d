//! Path Resolution Engine.
//!
//! Maps an address plus the current logical position onto a node and its
//! directory. Logical paths and directories differ at every level by the
//! owning manifest's `repos_dir`, so the physical path is always rebuilt by
//! walking from root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::path::{self, ROOT, Segment};
use crate::error::GroveError;
use crate::io::git::GitProvider;
use crate::io::manifest::ConfigProvider;
use crate::tree::{NodeInfo, NodeKind};
use crate::workspace::Workspace;

/// A resolved address: the node and its (canonicalized) directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub node: NodeInfo,
    pub physical: PathBuf,
}

impl<G: GitProvider, C: ConfigProvider> Workspace<G, C> {
    /// Directory of the node at logical `path`.
    ///
    /// Each level contributes its owner's effective repos dir and its name.
    /// Does not touch the filesystem.
    pub fn physical_path(&self, path: &str) -> Result<PathBuf> {
        self.store.get_node(path)?;
        let mut physical = self.root_dir.clone();
        let mut owner = ROOT.to_string();
        for name in path::names(path) {
            let repos_dir = self
                .store
                .get_node(&owner)?
                .children_source
                .as_ref()
                .map_or(self.settings.default_repos_dir.as_str(), |source| {
                    source.repos_dir.as_str()
                });
            physical.push(repos_dir);
            physical.push(name);
            owner = path::join(&owner, name);
        }
        Ok(physical)
    }

    /// Logical position that relative addresses start from.
    ///
    /// A working directory inside some node's directory selects that node.
    /// At the workspace root, its holding directory, or outside the
    /// workspace, no node is selected and the position recorded by
    /// `navigate` applies.
    ///
    /// The root's holding directory selects no node rather than `/`.
    pub fn current_position(&mut self) -> Result<String> {
        self.store.ensure_loaded()?;
        if let Some(cwd) = self.cwd.clone() {
            match fs::canonicalize(&cwd) {
                Ok(dir) if dir.starts_with(&self.root_dir) => {
                    let position = self.position_of(&dir);
                    if position != ROOT {
                        return Ok(position);
                    }
                }
                Ok(_) => debug!(cwd = %cwd.display(), "working directory outside workspace"),
                Err(err) => debug!(cwd = %cwd.display(), error = %err, "working directory unusable"),
            }
        }

        let persisted = self.store.get_path().to_string();
        let absolute = if persisted.starts_with('/') {
            persisted.clone()
        } else {
            format!("/{persisted}")
        };
        match self.locate(&absolute, false) {
            Ok(position) => Ok(position),
            Err(err) => {
                warn!(path = %persisted, error = %format!("{err:#}"), "stale current path, using root");
                Ok(ROOT.to_string())
            }
        }
    }

    /// Deepest known node whose directory contains `dir`.
    ///
    /// A holding directory (`<node>/<repos_dir>`) lies under its owner but
    /// under none of the owner's children, so it maps to the owner. For the
    /// workspace root's holding directory that is `/`.
    fn position_of(&mut self, dir: &Path) -> String {
        let mut current = ROOT.to_string();
        'descend: loop {
            if let Err(err) = self.ensure_children(&current, false) {
                debug!(path = %current, error = %format!("{err:#}"), "cannot descend for position");
                break;
            }
            let children = match self.store.get_node(&current) {
                Ok(node) => node.children.clone(),
                Err(_) => break,
            };
            for name in children {
                let child = path::join(&current, &name);
                let Ok(physical) = self.physical_path(&child) else {
                    continue;
                };
                if dir.starts_with(&physical) {
                    current = child;
                    continue 'descend;
                }
            }
            break;
        }
        debug!(dir = %dir.display(), position = %current, "mapped working directory");
        current
    }

    /// Walk `target` to a logical path without checking the disk.
    ///
    /// `..` is clamped at root. With `ensure`, nodes whose directories are
    /// missing are materialized on the way down so their children can be
    /// looked up.
    #[instrument(skip(self))]
    pub fn locate(&mut self, target: &str, ensure: bool) -> Result<String> {
        self.store.ensure_loaded()?;
        let address = path::parse_address(target);
        let mut current = if address.absolute {
            ROOT.to_string()
        } else {
            self.current_position()?
        };

        for segment in address.segments {
            match segment {
                Segment::Parent => {
                    if let Some(parent) = path::parent(&current) {
                        current = parent.to_string();
                    }
                }
                Segment::Name(name) => {
                    self.ensure_children(&current, ensure)?;
                    let child = path::join(&current, &name);
                    if !self.store.contains(&child) {
                        return Err(GroveError::PathNotFound {
                            path: target.to_string(),
                            segment: name,
                        }
                        .into());
                    }
                    current = child;
                }
            }
        }
        Ok(current)
    }

    /// Resolve `target` to a node and its directory.
    ///
    /// A missing directory fails with `PhysicalMissing` unless `ensure` is
    /// set, in which case the node is cloned (or created) first.
    #[instrument(skip(self))]
    pub fn resolve(&mut self, target: &str, ensure: bool) -> Result<Resolved> {
        let logical = self.locate(target, ensure)?;
        let physical = self.physical_path(&logical)?;
        if !physical.is_dir() {
            if !ensure {
                return Err(GroveError::PhysicalMissing {
                    path: logical,
                    physical,
                }
                .into());
            }
            self.materialize(&logical)?;
        }
        let physical = fs::canonicalize(&physical)
            .with_context(|| format!("canonicalize {}", physical.display()))?;
        let node = self.store.get_node(&logical)?.clone();
        Ok(Resolved { node, physical })
    }

    /// Bring the node at `path` onto disk.
    ///
    /// Repositories are cloned from their URL; group and config nodes get a
    /// plain directory. The node is marked cloned, `is_lazy` is kept, and the
    /// owning manifest is rewritten on a best-effort basis.
    #[instrument(skip(self))]
    pub fn materialize(&mut self, path: &str) -> Result<()> {
        let physical = self.physical_path(path)?;
        let mut node = self.store.get_node(path)?.clone();
        let cloned_repo = if physical.is_dir() {
            debug!("already on disk");
            false
        } else {
            match &node.kind {
                NodeKind::Repo { url } => {
                    if let Some(parent) = physical.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("create directory {}", parent.display()))?;
                    }
                    self.git
                        .clone_repo(url, &physical)
                        .map_err(|err| GroveError::CloneFailed {
                            url: url.clone(),
                            dest: physical.clone(),
                            source: err.into(),
                        })?;
                    info!(url = %url, dest = %physical.display(), "cloned");
                    true
                }
                NodeKind::Group | NodeKind::ConfigRef { .. } => {
                    fs::create_dir_all(&physical)
                        .with_context(|| format!("create directory {}", physical.display()))?;
                    info!(dest = %physical.display(), "created node directory");
                    false
                }
            }
        };

        if !node.is_cloned {
            node.is_cloned = true;
            self.store.update_node(path, node)?;
        }
        if cloned_repo {
            if let Err(err) = self.persist_owner(path) {
                warn!(path, error = %format!("{err:#}"), "failed to persist manifest after clone");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGit, GitCall, TestWorkspace, manifest};
    use crate::tree::NodeDefinition;

    fn sample() -> TestWorkspace {
        TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![
                NodeDefinition::repo("api", "u-api"),
                NodeDefinition::repo("web", "u-web").lazy(),
                NodeDefinition::group("tools"),
            ],
        ))
        .expect("workspace")
    }

    #[test]
    fn physical_path_follows_repos_dirs() {
        let ws = sample();
        let workspace = ws.open(FakeGit::new()).expect("open");
        assert_eq!(
            workspace.physical_path("/").expect("root"),
            workspace.root_dir()
        );
        assert_eq!(
            workspace.physical_path("/api").expect("api"),
            workspace.root_dir().join("repos").join("api")
        );
    }

    #[test]
    fn slashes_normalize_to_the_same_node() {
        let ws = sample();
        ws.mkdir("repos/api").expect("mkdir");
        let mut workspace = ws.open(FakeGit::new()).expect("open");

        let plain = workspace.resolve("/api", false).expect("plain");
        let doubled = workspace.resolve("//api", false).expect("doubled");
        let trailing = workspace.resolve("/api/", false).expect("trailing");
        assert_eq!(plain, doubled);
        assert_eq!(plain, trailing);
    }

    #[test]
    fn parent_of_root_is_root() {
        let ws = sample();
        let mut workspace = ws.open(FakeGit::new()).expect("open");
        let resolved = workspace.resolve("..", false).expect("clamped");
        assert_eq!(resolved.node.path, "/");
        assert_eq!(resolved.physical, workspace.root_dir());
        assert_eq!(workspace.locate("~/../..", false).expect("tilde"), "/");
    }

    #[test]
    fn unknown_name_is_path_not_found() {
        let ws = sample();
        let mut workspace = ws.open(FakeGit::new()).expect("open");
        let err = workspace.resolve("/nope", false).unwrap_err();
        match GroveError::find(&err) {
            Some(GroveError::PathNotFound { segment, .. }) => assert_eq!(segment, "nope"),
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn ensure_clones_lazy_node_and_keeps_it_lazy() {
        let ws = sample();
        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");

        let err = workspace.resolve("/web", false).unwrap_err();
        assert!(matches!(
            GroveError::find(&err),
            Some(GroveError::PhysicalMissing { .. })
        ));

        let resolved = workspace.resolve("/web", true).expect("ensure");
        assert!(resolved.node.is_cloned);
        assert!(resolved.node.is_lazy);
        assert!(resolved.physical.ends_with("repos/web"));
        assert_eq!(
            git.calls(),
            vec![GitCall::Clone {
                url: "u-web".to_string(),
                dest: workspace.root_dir().join("repos/web"),
            }]
        );
    }

    #[test]
    fn clone_failure_is_reported_with_url() {
        let ws = sample();
        let git = FakeGit::new().fail_clone("web");
        let mut workspace = ws.open(git).expect("open");
        let err = workspace.resolve("/web", true).unwrap_err();
        match GroveError::find(&err) {
            Some(GroveError::CloneFailed { url, .. }) => assert_eq!(url, "u-web"),
            other => panic!("expected clone failure, got {other:?}"),
        }
        assert!(!workspace.store().get_node("/web").expect("web").is_cloned);
    }

    #[test]
    fn ensure_on_group_creates_directory_without_git() {
        let ws = sample();
        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");
        workspace.resolve("/tools", true).expect("ensure");
        assert!(ws.root().join("repos/tools").is_dir());
        assert!(git.calls().is_empty());
    }

    #[test]
    fn holding_directory_maps_to_root() {
        let ws = sample();
        ws.mkdir("repos/api/src").expect("mkdir");
        let mut workspace = ws.open(FakeGit::new()).expect("open");

        workspace.set_cwd(Some(ws.root().join("repos")));
        assert_eq!(workspace.current_position().expect("position"), "/");

        workspace.set_cwd(Some(ws.root().join("repos/api/src")));
        assert_eq!(workspace.current_position().expect("position"), "/api");
        assert_eq!(workspace.locate("..", false).expect("parent"), "/");
    }

    #[test]
    fn persisted_position_is_used_without_cwd() {
        let ws = sample();
        ws.mkdir("repos/api").expect("mkdir");
        let mut workspace = ws.open(FakeGit::new()).expect("open");
        workspace.navigate("/api", false).expect("navigate");

        let mut reopened = ws.open(FakeGit::new()).expect("reopen");
        assert_eq!(reopened.current_position().expect("position"), "/api");
        assert_eq!(reopened.locate("../web", false).expect("sibling"), "/web");

        reopened.set_cwd(Some(ws.root().to_path_buf()));
        assert_eq!(reopened.current_position().expect("at root"), "/api");
        reopened.set_cwd(Some(ws.root().join("repos/api")));
        assert_eq!(reopened.locate("..", false).expect("from cwd"), "/");
    }

    #[test]
    fn stale_persisted_position_falls_back_to_root() {
        let ws = sample();
        let mut workspace = ws.open(FakeGit::new()).expect("open");
        workspace.store.set_path("/gone");
        assert_eq!(workspace.current_position().expect("position"), "/");
    }
}
