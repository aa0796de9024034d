//! Workspace scaffolding and root discovery.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{GroveSettings, write_settings};
use super::manifest::{ConfigProvider, FileManifests, MANIFEST_FILE};
use super::tree_state::write_tree_state;
use crate::core::types::TreeState;
use crate::error::GroveError;
use crate::tree::WorkspaceTree;

/// All canonical paths of a workspace rooted at `root`.
#[derive(Debug, Clone)]
pub struct GrovePaths {
    pub root: PathBuf,
    pub grove_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub state_path: PathBuf,
    pub config_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl GrovePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let grove_dir = root.join(".grove");
        Self {
            root: root.clone(),
            grove_dir: grove_dir.clone(),
            manifest_path: root.join(MANIFEST_FILE),
            state_path: grove_dir.join("state.json"),
            config_path: grove_dir.join("config.toml"),
            gitignore_path: grove_dir.join(".gitignore"),
        }
    }
}

/// Options for `init_workspace`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Workspace name; defaults to the root directory's name.
    pub name: Option<String>,
    /// If true, overwrite an existing manifest and state.
    pub force: bool,
}

/// Create `.grove/` scaffolding and a root manifest in `root`.
///
/// Fails if a root manifest already exists unless `options.force` is set.
pub fn init_workspace(root: &Path, options: &InitOptions) -> Result<GrovePaths> {
    let paths = GrovePaths::new(root);
    if paths.manifest_path.exists() && !options.force {
        return Err(anyhow!(
            "grove init: {} already exists (use --force to overwrite)",
            paths.manifest_path.display()
        ));
    }
    if paths.grove_dir.exists() && !paths.grove_dir.is_dir() {
        return Err(anyhow!("grove init: .grove exists but is not a directory"));
    }

    fs::create_dir_all(&paths.grove_dir)
        .with_context(|| format!("create directory {}", paths.grove_dir.display()))?;

    let settings = GroveSettings::default();
    let name = match &options.name {
        Some(name) => name.clone(),
        None => default_name(root),
    };
    let manifest = WorkspaceTree::new(name, settings.default_repos_dir.clone());
    FileManifests.save(&paths.manifest_path, &manifest)?;

    if options.force || !paths.config_path.exists() {
        write_settings(&paths.config_path, &settings)?;
    }
    write_tree_state(&paths.state_path, &TreeState::default())?;
    fs::write(&paths.gitignore_path, GROVE_GITIGNORE)
        .with_context(|| format!("write file {}", paths.gitignore_path.display()))?;

    Ok(paths)
}

/// Nearest ancestor of `start` (inclusive) that holds a `.grove/` directory.
///
/// Nested `grove.yaml` files inside repositories do not mark a workspace root.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf> {
    start
        .ancestors()
        .find(|dir| GrovePaths::new(*dir).grove_dir.is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| GroveError::NotInitialized.into())
}

fn default_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string())
}

const GROVE_GITIGNORE: &str = "state.json\n";
