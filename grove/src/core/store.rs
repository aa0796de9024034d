//! In-memory tree store.
//!
//! Nodes live in a map keyed by logical path; parent/child structure is the
//! ordered `children` name list on each node. Mutations are visible to the
//! next read immediately. There is no caching or transaction layer, so
//! callers that need several mutations to appear atomic serialize around the
//! store themselves.

use std::collections::HashMap;

use anyhow::{Result, anyhow};

use super::path::{self, ROOT};
use super::types::TreeState;
use crate::error::GroveError;
use crate::tree::{ChildSource, NodeInfo, NodeTree};

#[derive(Debug, Default)]
pub struct TreeStore {
    nodes: HashMap<String, NodeInfo>,
    state: TreeState,
    loaded: bool,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn ensure_loaded(&self) -> Result<()> {
        if !self.loaded {
            return Err(GroveError::NotInitialized.into());
        }
        Ok(())
    }

    /// Replace the whole tree with a single root node.
    ///
    /// Children are attached afterwards with [`TreeStore::splice_children`].
    pub fn load(&mut self, mut root: NodeInfo) {
        root.path = ROOT.to_string();
        root.children.clear();
        root.children_loaded = false;
        root.children_source = None;
        self.nodes.clear();
        self.nodes.insert(ROOT.to_string(), root);
        self.loaded = true;
    }

    /// Replace `parent`'s children with `children`, recording their source.
    ///
    /// Any previously attached subtree under `parent` is dropped first.
    pub fn splice_children(
        &mut self,
        parent: &str,
        source: ChildSource,
        children: Vec<NodeInfo>,
    ) -> Result<()> {
        self.ensure_loaded()?;
        let previous = self.node(parent)?.children.clone();
        for name in previous {
            self.remove_subtree(&path::join(parent, &name));
        }

        let mut names = Vec::with_capacity(children.len());
        for child in &children {
            path::validate_name(&child.name)?;
            let expected = path::join(parent, &child.name);
            if child.path != expected {
                return Err(anyhow!(
                    "child path {} does not match parent {parent}",
                    child.path
                ));
            }
            if names.contains(&child.name) {
                return Err(GroveError::DuplicateNode { path: expected }.into());
            }
            names.push(child.name.clone());
        }
        for child in children {
            self.nodes.insert(child.path.clone(), child);
        }

        let node = self.node_mut(parent)?;
        node.children = names;
        node.children_source = Some(source);
        node.children_loaded = true;
        Ok(())
    }

    /// Record that `path` has no further children to discover.
    pub fn mark_children_loaded(&mut self, path: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.node_mut(path)?.children_loaded = true;
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.loaded && self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_node(&self, path: &str) -> Result<&NodeInfo> {
        self.ensure_loaded()?;
        self.node(path)
    }

    /// Insert `node` as the last child of `parent`.
    pub fn add_node(&mut self, parent: &str, mut node: NodeInfo) -> Result<()> {
        self.ensure_loaded()?;
        path::validate_name(&node.name)?;
        self.node(parent)?;
        let node_path = path::join(parent, &node.name);
        if self.nodes.contains_key(&node_path) {
            return Err(GroveError::DuplicateNode { path: node_path }.into());
        }
        node.path = node_path.clone();
        let name = node.name.clone();
        self.nodes.insert(node_path, node);
        self.node_mut(parent)?.children.push(name);
        Ok(())
    }

    /// Replace the stored node at `path`. Identity (`path`, `name`) must not change.
    pub fn update_node(&mut self, path: &str, node: NodeInfo) -> Result<()> {
        self.ensure_loaded()?;
        let current = self.node(path)?;
        if node.path != path || node.name != current.name {
            return Err(anyhow!(
                "update of {path} cannot move the node to {}",
                node.path
            ));
        }
        self.nodes.insert(path.to_string(), node);
        Ok(())
    }

    /// Remove `path` and everything below it, detaching it from its parent.
    pub fn remove_node(&mut self, path: &str) -> Result<NodeInfo> {
        self.ensure_loaded()?;
        let parent = path::parent(path).ok_or(GroveError::RootImmutable)?;
        let removed = self.node(path)?.clone();
        self.remove_subtree(path);
        let parent_node = self.node_mut(parent)?;
        parent_node.children.retain(|name| *name != removed.name);
        Ok(removed)
    }

    pub fn list_children(&self, path: &str) -> Result<Vec<&NodeInfo>> {
        let node = self.get_node(path)?;
        node.children
            .iter()
            .map(|name| self.node(&path::join(path, name)))
            .collect()
    }

    /// Nested snapshot of the whole tree.
    pub fn get_tree(&self) -> Result<NodeTree> {
        self.subtree(ROOT)
    }

    pub fn subtree(&self, path: &str) -> Result<NodeTree> {
        let node = self.get_node(path)?.clone();
        let children = node
            .children
            .iter()
            .map(|name| self.subtree(&path::join(path, name)))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeTree { node, children })
    }

    /// Make `path` the current position. The node must exist.
    pub fn navigate(&mut self, path: &str) -> Result<()> {
        self.get_node(path)?;
        self.state.current_path = path.to_string();
        Ok(())
    }

    pub fn get_current(&self) -> Result<&NodeInfo> {
        self.get_node(&self.state.current_path)
    }

    pub fn get_path(&self) -> &str {
        &self.state.current_path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.state.current_path = path.into();
    }

    pub fn get_state(&self) -> &TreeState {
        &self.state
    }

    pub fn set_state(&mut self, state: TreeState) {
        self.state = state;
    }

    fn node(&self, path: &str) -> Result<&NodeInfo> {
        self.nodes.get(path).ok_or_else(|| not_found(path))
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut NodeInfo> {
        self.nodes.get_mut(path).ok_or_else(|| not_found(path))
    }

    fn remove_subtree(&mut self, path: &str) {
        if let Some(node) = self.nodes.remove(path) {
            for name in node.children {
                self.remove_subtree(&path::join(path, &name));
            }
        }
    }
}

fn not_found(path: &str) -> anyhow::Error {
    GroveError::PathNotFound {
        path: path.to_string(),
        segment: path::leaf_name(path).to_string(),
    }
    .into()
}
