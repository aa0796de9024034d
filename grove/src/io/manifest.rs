//! Manifest files (`grove.yaml`, or any referenced `file:`).
//!
//! The tree engine reads and writes manifests only through
//! [`ConfigProvider`]. [`FileManifests`] stores them on disk as YAML, or as
//! JSON when the file name ends in `.json`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::tree::WorkspaceTree;

/// File name of every manifest grove discovers by itself.
pub const MANIFEST_FILE: &str = "grove.yaml";

pub trait ConfigProvider {
    fn load(&self, path: &Path) -> Result<WorkspaceTree>;
    fn save(&self, path: &Path, tree: &WorkspaceTree) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ManifestFormat::Json,
            _ => ManifestFormat::Yaml,
        }
    }
}

/// [`ConfigProvider`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileManifests;

impl ConfigProvider for FileManifests {
    fn load(&self, path: &Path) -> Result<WorkspaceTree> {
        debug!(path = %path.display(), "loading manifest");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        let tree = match ManifestFormat::of(path) {
            ManifestFormat::Yaml => serde_yaml::from_str(&contents)
                .with_context(|| format!("parse manifest {}", path.display()))?,
            ManifestFormat::Json => serde_json::from_str(&contents)
                .with_context(|| format!("parse manifest {}", path.display()))?,
        };
        Ok(tree)
    }

    fn save(&self, path: &Path, tree: &WorkspaceTree) -> Result<()> {
        debug!(path = %path.display(), nodes = tree.nodes.len(), "writing manifest");
        let buf = match ManifestFormat::of(path) {
            ManifestFormat::Yaml => serde_yaml::to_string(tree).context("serialize manifest")?,
            ManifestFormat::Json => {
                let mut buf = serde_json::to_string_pretty(tree).context("serialize manifest")?;
                buf.push('\n');
                buf
            }
        };
        super::write_atomic(path, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Fetch, NodeDefinition};

    #[test]
    fn yaml_defaults_fill_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MANIFEST_FILE);
        fs::write(
            &path,
            "workspace:\n  name: platform\nnodes:\n  - name: api\n    url: git@example.com:api.git\n  - name: team\n    file: team.yaml\n    fetch: lazy\n",
        )
        .expect("write");

        let tree = FileManifests.load(&path).expect("load");
        assert_eq!(tree.name(), "platform");
        assert_eq!(tree.repos_dir(), None);
        assert_eq!(tree.nodes[0].fetch, Fetch::Eager);
        assert_eq!(tree.nodes[1].fetch, Fetch::Lazy);
        assert_eq!(tree.nodes[1].file.as_deref(), Some("team.yaml"));
    }

    #[test]
    fn json_extension_selects_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("team.json");
        let tree = WorkspaceTree::new("team", "custom-repos")
            .with_nodes(vec![NodeDefinition::repo("svc", "u").lazy()]);
        FileManifests.save(&path, &tree).expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.trim_start().starts_with('{'));
        assert_eq!(FileManifests.load(&path).expect("load"), tree);
    }

    #[test]
    fn saved_yaml_omits_absent_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MANIFEST_FILE);
        let tree = WorkspaceTree::new("w", "repos").with_nodes(vec![NodeDefinition::group("g")]);
        FileManifests.save(&path, &tree).expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(!raw.contains("url"));
        assert!(!raw.contains("file"));
        assert!(raw.contains("fetch: eager"));
    }
}
