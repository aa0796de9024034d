//! Workspace manager: the tree store plus the collaborators it needs.
//!
//! Path resolution (`resolve`), lazy child loading (`loader`), recursive
//! operations (`ops`) and listings (`list`) are implemented on
//! [`Workspace`] in their own modules.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::invariants::validate_definition;
use crate::core::path::{self, ROOT};
use crate::core::store::TreeStore;
use crate::error::GroveError;
use crate::io::config::{GroveSettings, load_settings};
use crate::io::git::GitProvider;
use crate::io::init::GrovePaths;
use crate::io::manifest::{ConfigProvider, MANIFEST_FILE};
use crate::io::tree_state::{load_tree_state, write_tree_state};
use crate::resolve::Resolved;
use crate::tree::{ChildSource, NodeDefinition, NodeInfo, WorkspaceTree};

/// Answer of [`Workspace::describe`].
#[derive(Debug, Clone)]
pub struct NodeDetails {
    pub node: NodeInfo,
    pub physical: PathBuf,
    pub on_disk: bool,
    /// Checked-out branch; repositories on disk only.
    pub branch: Option<String>,
    pub remotes: BTreeMap<String, String>,
}

pub struct Workspace<G, C> {
    pub(crate) root_dir: PathBuf,
    pub(crate) paths: GrovePaths,
    pub(crate) settings: GroveSettings,
    pub(crate) store: TreeStore,
    pub(crate) git: G,
    pub(crate) manifests: C,
    pub(crate) cwd: Option<PathBuf>,
}

impl<G: GitProvider, C: ConfigProvider> Workspace<G, C> {
    /// Create an unloaded workspace. Every tree operation reports
    /// `NotInitialized` until [`Workspace::load`] succeeds.
    pub fn new(root: &Path, settings: GroveSettings, git: G, manifests: C) -> Result<Self> {
        let root_dir = root
            .canonicalize()
            .with_context(|| format!("resolve workspace root {}", root.display()))?;
        Ok(Self {
            paths: GrovePaths::new(&root_dir),
            root_dir,
            settings,
            store: TreeStore::new(),
            git,
            manifests,
            cwd: None,
        })
    }

    /// Load settings, state and the root manifest of the workspace at `root`.
    pub fn open(root: &Path, git: G, manifests: C) -> Result<Self> {
        let settings = load_settings(&GrovePaths::new(root).config_path)?;
        let mut workspace = Self::new(root, settings, git, manifests)?;
        workspace.load()?;
        Ok(workspace)
    }

    /// Map relative addresses through this working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn set_cwd(&mut self, cwd: Option<PathBuf>) {
        self.cwd = cwd;
    }

    /// (Re)load the root manifest and persisted state, replacing the tree.
    #[instrument(skip_all, fields(root = %self.root_dir.display()))]
    pub fn load(&mut self) -> Result<()> {
        let manifest_path = self.paths.manifest_path.clone();
        if !manifest_path.is_file() {
            return Err(GroveError::NotInitialized.into());
        }
        let tree = self.manifests.load(&manifest_path)?;
        self.store.load(NodeInfo::root(tree.name()));
        self.store.set_state(load_tree_state(&self.paths.state_path)?);
        self.splice_manifest(ROOT, manifest_path, tree)?;
        info!(nodes = self.store.len(), "workspace loaded");
        Ok(())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn paths(&self) -> &GrovePaths {
        &self.paths
    }

    pub fn settings(&self) -> &GroveSettings {
        &self.settings
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    /// Resolve `target` and record it as the persisted current position.
    #[instrument(skip(self))]
    pub fn navigate(&mut self, target: &str, ensure: bool) -> Result<Resolved> {
        let resolved = self.resolve(target, ensure)?;
        self.store.navigate(&resolved.node.path)?;
        write_tree_state(&self.paths.state_path, self.store.get_state())?;
        info!(path = %resolved.node.path, "navigated");
        Ok(resolved)
    }

    pub fn current(&self) -> Result<&NodeInfo> {
        self.store.get_current()
    }

    /// Node at `target` plus what git reports for it when it is on disk.
    pub fn describe(&mut self, target: &str) -> Result<NodeDetails> {
        let logical = self.locate(target, false)?;
        let node = self.store.get_node(&logical)?.clone();
        let physical = self.physical_path(&logical)?;
        let mut details = NodeDetails {
            node,
            physical: physical.clone(),
            on_disk: physical.is_dir(),
            branch: None,
            remotes: BTreeMap::new(),
        };
        if details.on_disk && details.node.repository().is_some() {
            details.branch = Some(self.git.current_branch(&physical)?);
            details.remotes = self.git.remotes(&physical)?;
        }
        Ok(details)
    }

    /// Declare a new child under `parent_target` and persist it.
    ///
    /// When the parent has no manifest for its children yet, one is created
    /// at `<parent dir>/grove.yaml` with the default repos dir.
    #[instrument(skip(self, def), fields(name = %def.name))]
    pub fn add_node(&mut self, parent_target: &str, def: NodeDefinition) -> Result<String> {
        let problems = validate_definition(&def);
        if !problems.is_empty() {
            return Err(anyhow!("invalid node {}: {}", def.name, problems.join("; ")));
        }

        let parent = self.locate(parent_target, false)?;
        self.ensure_children(&parent, false)?;
        if self.store.get_node(&parent)?.children_source.is_none() {
            self.adopt_new_manifest(&parent)?;
        }

        self.store
            .add_node(&parent, NodeInfo::from_definition(&parent, &def))?;
        let node_path = path::join(&parent, &def.name);
        let physical = self.physical_path(&node_path)?;
        if physical.is_dir() {
            let mut node = self.store.get_node(&node_path)?.clone();
            node.is_cloned = true;
            self.store.update_node(&node_path, node)?;
        }
        self.save_children_manifest(&parent)?;
        info!(path = %node_path, "node added");
        Ok(node_path)
    }

    /// Remove `target` and its subtree from the tree and from its manifest.
    ///
    /// Directories on disk are left untouched.
    #[instrument(skip(self))]
    pub fn remove_node(&mut self, target: &str) -> Result<NodeInfo> {
        let node_path = self.locate(target, false)?;
        let parent = path::parent(&node_path).ok_or(GroveError::RootImmutable)?;
        let parent = parent.to_string();
        let removed = self.store.remove_node(&node_path)?;
        self.save_children_manifest(&parent)?;
        if self.store.get_path() == node_path
            || self.store.get_path().starts_with(&format!("{node_path}/"))
        {
            self.store.set_path(parent.clone());
            write_tree_state(&self.paths.state_path, self.store.get_state())?;
        }
        info!(path = %node_path, "node removed");
        Ok(removed)
    }

    /// Write the manifest that declares `owner`'s children back to disk.
    pub(crate) fn save_children_manifest(&self, owner: &str) -> Result<()> {
        let (file, tree) = self.children_manifest(owner)?;
        self.manifests.save(&file, &tree)
    }

    /// Persist the manifest that declares `node_path`.
    ///
    /// Leaves the file alone when it already holds these declarations, so
    /// comments and formatting survive.
    pub(crate) fn persist_owner(&self, node_path: &str) -> Result<()> {
        let Some(parent) = path::parent(node_path) else {
            return Ok(());
        };
        let (file, tree) = self.children_manifest(parent)?;
        if self
            .manifests
            .load(&file)
            .is_ok_and(|on_disk| on_disk == tree)
        {
            debug!(file = %file.display(), "manifest unchanged");
            return Ok(());
        }
        self.manifests.save(&file, &tree)
    }

    /// Manifest file and document describing `owner`'s current children.
    fn children_manifest(&self, owner: &str) -> Result<(PathBuf, WorkspaceTree)> {
        let node = self.store.get_node(owner)?;
        let source = node
            .children_source
            .as_ref()
            .with_context(|| format!("{owner} has no manifest for its children"))?;
        let nodes = self
            .store
            .list_children(owner)?
            .into_iter()
            .map(NodeInfo::to_definition)
            .collect();
        let tree = WorkspaceTree {
            workspace: source.header(),
            nodes,
        };
        Ok((source.config_file.clone(), tree))
    }

    /// Give `owner` a fresh, empty manifest inside its own directory.
    fn adopt_new_manifest(&mut self, owner: &str) -> Result<()> {
        let dir = self.physical_path(owner)?;
        if !dir.is_dir() {
            return Err(GroveError::PhysicalMissing {
                path: owner.to_string(),
                physical: dir,
            }
            .into());
        }
        let config_file = dir.join(MANIFEST_FILE);
        let source = ChildSource {
            config_file,
            workspace_name: self.store.get_node(owner)?.name.clone(),
            repos_dir: self.settings.default_repos_dir.clone(),
            declared_repos_dir: Some(self.settings.default_repos_dir.clone()),
        };
        debug!(owner, file = %source.config_file.display(), "creating manifest for children");
        self.store.splice_children(owner, source, Vec::new())
    }
}
