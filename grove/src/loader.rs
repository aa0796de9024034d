//! Lazy loading of node children from manifests.
//!
//! A node's children come from exactly one manifest: the file named by a
//! config reference, or a `grove.yaml` found inside a materialized node
//! directory. Children are only read when something needs to descend past
//! the node, and only once the node's directory exists.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::invariants::validate_manifest;
use crate::core::path;
use crate::error::GroveError;
use crate::io::git::GitProvider;
use crate::io::manifest::{ConfigProvider, MANIFEST_FILE};
use crate::tree::{ChildSource, NodeInfo, NodeKind, WorkspaceTree};
use crate::workspace::Workspace;

impl<G: GitProvider, C: ConfigProvider> Workspace<G, C> {
    /// Make `path`'s children known, reading its manifest if needed.
    ///
    /// With `materialize`, a missing node directory is cloned or created
    /// first. Without it, children of an unmaterialized node stay unknown;
    /// for a config reference that is an error because the caller asked to
    /// descend into it.
    #[instrument(skip(self))]
    pub fn ensure_children(&mut self, path: &str, materialize: bool) -> Result<()> {
        let node = self.store.get_node(path)?.clone();
        if node.children_loaded {
            return Ok(());
        }

        let physical = self.physical_path(path)?;
        if !physical.is_dir() {
            if materialize {
                self.materialize(path)?;
            } else if node.is_config_ref() {
                return Err(GroveError::PhysicalMissing {
                    path: path.to_string(),
                    physical,
                }
                .into());
            } else {
                debug!("children unknown until the node is materialized");
                return Ok(());
            }
        }

        let manifest = match &node.kind {
            NodeKind::ConfigRef { file } => self.reference_path(path, file)?,
            NodeKind::Repo { .. } | NodeKind::Group => {
                let nested = physical.join(MANIFEST_FILE);
                if !nested.is_file() {
                    self.store.mark_children_loaded(path)?;
                    return Ok(());
                }
                nested
            }
        };

        self.check_cycle(path, &manifest)?;
        let tree = self.manifests.load(&manifest)?;
        self.splice_manifest(path, manifest, tree)
    }

    /// Validate `tree` and attach its nodes as `owner`'s children.
    pub(crate) fn splice_manifest(
        &mut self,
        owner: &str,
        file: PathBuf,
        tree: WorkspaceTree,
    ) -> Result<()> {
        let problems = validate_manifest(&tree);
        if !problems.is_empty() {
            return Err(GroveError::InvalidManifest { file, problems }.into());
        }

        let repos_dir = tree
            .repos_dir()
            .unwrap_or(self.settings.default_repos_dir.as_str())
            .to_string();
        let holding_dir = self.physical_path(owner)?.join(&repos_dir);
        let children = tree
            .nodes
            .iter()
            .map(|def| {
                let mut child = NodeInfo::from_definition(owner, def);
                child.is_cloned = holding_dir.join(&def.name).is_dir();
                child
            })
            .collect::<Vec<_>>();
        debug!(
            owner,
            file = %file.display(),
            repos_dir = %repos_dir,
            children = children.len(),
            "splicing manifest"
        );
        let source = ChildSource {
            config_file: file,
            workspace_name: tree.workspace.name,
            repos_dir,
            declared_repos_dir: tree.workspace.repos_dir,
        };
        self.store.splice_children(owner, source, children)
    }

    /// Manifest path for a config reference declared under `path`.
    ///
    /// Relative references resolve against the directory of the manifest
    /// that declares the node.
    fn reference_path(&self, path: &str, file: &str) -> Result<PathBuf> {
        let file = Path::new(file);
        if file.is_absolute() {
            return Ok(file.to_path_buf());
        }
        let parent = path::parent(path).unwrap_or(path::ROOT);
        let declared_in = self
            .store
            .get_node(parent)?
            .config_file()
            .with_context(|| format!("{parent} has no manifest declaring {path}"))?;
        let base = declared_in.parent().unwrap_or(self.root_dir.as_path());
        Ok(base.join(file))
    }

    /// Reject `manifest` if any ancestor's children already came from it.
    fn check_cycle(&self, path: &str, manifest: &Path) -> Result<()> {
        let target = canonical(manifest);
        let mut chain = Vec::new();
        for ancestor in path::lineage(path) {
            if let Some(file) = self.store.get_node(&ancestor)?.config_file() {
                chain.push(canonical(file));
            }
        }
        if chain.contains(&target) {
            chain.push(target);
            return Err(GroveError::ConfigCycle { chain }.into());
        }
        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
