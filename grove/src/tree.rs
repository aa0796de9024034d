//! Declarative manifest model and the runtime node model built from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::path::{ROOT, join};

pub const DEFAULT_REPOS_DIR: &str = "repos";

/// Clone policy for a declared node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fetch {
    #[default]
    Eager,
    Lazy,
}

/// One entry of a manifest's `nodes` list.
///
/// A node carries a `url` (repository), a `file` (config reference) or
/// neither (group). Carrying both is rejected by manifest validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub fetch: Fetch,
}

impl NodeDefinition {
    pub fn repo(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            file: None,
            fetch: Fetch::Eager,
        }
    }

    pub fn config_ref(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            file: Some(file.into()),
            fetch: Fetch::Eager,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            file: None,
            fetch: Fetch::Eager,
        }
    }

    pub fn lazy(mut self) -> Self {
        self.fetch = Fetch::Lazy;
        self
    }
}

/// `workspace:` header of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub name: String,
    /// Omitted means the workspace's `default_repos_dir` setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos_dir: Option<String>,
}

/// A whole manifest document: header plus ordered node declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceTree {
    pub workspace: WorkspaceMeta,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

impl WorkspaceTree {
    pub fn new(name: impl Into<String>, repos_dir: impl Into<String>) -> Self {
        Self {
            workspace: WorkspaceMeta {
                name: name.into(),
                repos_dir: Some(repos_dir.into()),
            },
            nodes: Vec::new(),
        }
    }

    /// Manifest whose header leaves `repos_dir` to the workspace default.
    pub fn with_default_repos_dir(name: impl Into<String>) -> Self {
        Self {
            workspace: WorkspaceMeta {
                name: name.into(),
                repos_dir: None,
            },
            nodes: Vec::new(),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeDefinition>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn name(&self) -> &str {
        &self.workspace.name
    }

    /// `repos_dir` as declared, if the manifest names one.
    pub fn repos_dir(&self) -> Option<&str> {
        self.workspace.repos_dir.as_deref()
    }
}

/// What a node is, independent of whether it has been materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Pure grouping node.
    Group,
    /// Git repository cloned from `url`.
    Repo { url: String },
    /// Children come from the manifest at `file` (as declared, possibly relative).
    ConfigRef { file: String },
}

impl NodeKind {
    pub fn from_definition(def: &NodeDefinition) -> Self {
        match (&def.url, &def.file) {
            (Some(url), _) => NodeKind::Repo { url: url.clone() },
            (None, Some(file)) => NodeKind::ConfigRef { file: file.clone() },
            (None, None) => NodeKind::Group,
        }
    }
}

/// Manifest that a node's children were loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSource {
    /// Manifest file on disk.
    pub config_file: PathBuf,
    /// `workspace.name` of that manifest, kept so it can be written back.
    pub workspace_name: String,
    /// Directory (relative to the owning node) holding the children.
    pub repos_dir: String,
    /// `repos_dir` as written in the manifest; `None` when it was omitted.
    pub declared_repos_dir: Option<String>,
}

impl ChildSource {
    /// Manifest header to write back, keeping an omitted `repos_dir` omitted.
    pub fn header(&self) -> WorkspaceMeta {
        WorkspaceMeta {
            name: self.workspace_name.clone(),
            repos_dir: self.declared_repos_dir.clone(),
        }
    }
}

/// Runtime node, owned by the tree store and keyed by `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    /// Canonical logical path from root (`/`, `/backend/service-a`).
    pub path: String,
    pub kind: NodeKind,
    pub is_lazy: bool,
    pub is_cloned: bool,
    pub has_changes: bool,
    /// Child names in declared order.
    pub children: Vec<String>,
    pub children_source: Option<ChildSource>,
    /// False until the node's children are known (manifest read or probed).
    pub children_loaded: bool,
}

impl NodeInfo {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: ROOT.to_string(),
            kind: NodeKind::Group,
            is_lazy: false,
            is_cloned: true,
            has_changes: false,
            children: Vec::new(),
            children_source: None,
            children_loaded: false,
        }
    }

    pub fn from_definition(parent_path: &str, def: &NodeDefinition) -> Self {
        Self {
            name: def.name.clone(),
            path: join(parent_path, &def.name),
            kind: NodeKind::from_definition(def),
            is_lazy: def.fetch == Fetch::Lazy,
            is_cloned: false,
            has_changes: false,
            children: Vec::new(),
            children_source: None,
            children_loaded: false,
        }
    }

    /// Remote URL for repository nodes.
    pub fn repository(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Repo { url } => Some(url),
            _ => None,
        }
    }

    /// Manifest this node's children were loaded from, if any.
    pub fn config_file(&self) -> Option<&Path> {
        self.children_source
            .as_ref()
            .map(|source| source.config_file.as_path())
    }

    pub fn is_config_ref(&self) -> bool {
        matches!(self.kind, NodeKind::ConfigRef { .. })
    }

    pub fn to_definition(&self) -> NodeDefinition {
        let (url, file) = match &self.kind {
            NodeKind::Group => (None, None),
            NodeKind::Repo { url } => (Some(url.clone()), None),
            NodeKind::ConfigRef { file } => (None, Some(file.clone())),
        };
        NodeDefinition {
            name: self.name.clone(),
            url,
            file,
            fetch: if self.is_lazy {
                Fetch::Lazy
            } else {
                Fetch::Eager
            },
        }
    }
}

/// Nested snapshot of a subtree, as returned by `TreeStore::get_tree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTree {
    pub node: NodeInfo,
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    /// Nodes of the snapshot in pre-order.
    pub fn walk(&self) -> Vec<&NodeInfo> {
        let mut out = Vec::new();
        self.walk_into(&mut out);
        out
    }

    fn walk_into<'a>(&'a self, out: &mut Vec<&'a NodeInfo>) {
        out.push(&self.node);
        for child in &self.children {
            child.walk_into(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_round_trips_through_node_info() {
        let def = NodeDefinition::repo("svc", "git@example.com:svc.git").lazy();
        let node = NodeInfo::from_definition("/backend", &def);
        assert_eq!(node.path, "/backend/svc");
        assert!(node.is_lazy);
        assert_eq!(node.repository(), Some("git@example.com:svc.git"));
        assert_eq!(node.to_definition(), def);
    }

    #[test]
    fn kind_from_definition_distinguishes_variants() {
        assert_eq!(
            NodeKind::from_definition(&NodeDefinition::group("g")),
            NodeKind::Group
        );
        assert_eq!(
            NodeKind::from_definition(&NodeDefinition::config_ref("c", "team.yaml")),
            NodeKind::ConfigRef {
                file: "team.yaml".to_string()
            }
        );
    }
}
