//! Manifest invariants not expressible through serde alone.

use std::collections::HashSet;
use std::path::{Component, Path};

use super::path::validate_name;
use crate::tree::{NodeDefinition, WorkspaceTree};

/// Check manifest invariants:
/// - `workspace.name` is non-empty
/// - `repos_dir`, when given, is a relative path without `..`
/// - node names are valid path segments and unique among siblings
/// - a node has `url` xor `file` xor neither, and neither is blank
pub fn validate_manifest(tree: &WorkspaceTree) -> Vec<String> {
    let mut errors = Vec::new();
    if tree.name().trim().is_empty() {
        errors.push("workspace.name must not be empty".to_string());
    }
    if let Some(Err(reason)) = tree.repos_dir().map(validate_repos_dir) {
        errors.push(format!("workspace.repos_dir: {reason}"));
    }

    let mut seen = HashSet::new();
    for (index, node) in tree.nodes.iter().enumerate() {
        let label = format!("nodes[{index}] '{}'", node.name);
        if !seen.insert(node.name.as_str()) {
            errors.push(format!("{label}: duplicate name"));
        }
        errors.extend(
            validate_definition(node)
                .into_iter()
                .map(|err| format!("{label}: {err}")),
        );
    }
    errors
}

/// Checks that apply to a single node declaration.
pub fn validate_definition(node: &NodeDefinition) -> Vec<String> {
    let mut errors = Vec::new();
    if let Err(err) = validate_name(&node.name) {
        errors.push(err.to_string());
    }
    if node.url.is_some() && node.file.is_some() {
        errors.push("url and file are mutually exclusive".to_string());
    }
    if node.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
        errors.push("url must not be blank".to_string());
    }
    if node.file.as_deref().is_some_and(|file| file.trim().is_empty()) {
        errors.push("file must not be blank".to_string());
    }
    errors
}

/// A repos dir must stay inside the node directory that owns it.
pub fn validate_repos_dir(dir: &str) -> Result<(), String> {
    if dir.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    let path = Path::new(dir);
    if path.is_absolute() {
        return Err(format!("'{dir}' must be relative"));
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(format!("'{dir}' must not leave the node directory"));
    }
    Ok(())
}
