//! Listings: immediate children (capped) and full subtrees with status.
//!
//! Listing never clones anything. Children that are only knowable once a
//! node is on disk are shown if the node already is, and otherwise left out.

use std::fmt::Write as _;

use anyhow::Result;
use tracing::debug;

use crate::core::path;
use crate::core::status::{NodeStatus, TreeCounts};
use crate::io::git::GitProvider;
use crate::io::manifest::ConfigProvider;
use crate::tree::NodeInfo;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub path: String,
    pub status: NodeStatus,
    /// Depth below the listed node (its direct children are 1).
    pub depth: usize,
}

impl ListEntry {
    fn new(node: &NodeInfo, base_depth: usize) -> Self {
        Self {
            name: node.name.clone(),
            path: node.path.clone(),
            status: NodeStatus::of(node),
            depth: path::depth(&node.path) - base_depth,
        }
    }
}

/// Immediate children of a node, cut at the preview limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<ListEntry>,
    /// Children beyond the preview limit.
    pub hidden: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeListing {
    /// The listed node first, then its subtree in pre-order.
    pub entries: Vec<ListEntry>,
    /// Counts over the subtree below the listed node.
    pub counts: TreeCounts,
}

impl<G: GitProvider, C: ConfigProvider> Workspace<G, C> {
    pub fn list(&mut self, target: &str) -> Result<Listing> {
        let logical = self.locate(target, false)?;
        self.ensure_children(&logical, false)?;
        let base = path::depth(&logical);
        let limit = self.settings.list_preview_limit;
        let children = self.store.list_children(&logical)?;
        let hidden = children.len().saturating_sub(limit);
        let entries = children
            .into_iter()
            .take(limit)
            .map(|node| ListEntry::new(node, base))
            .collect();
        Ok(Listing { entries, hidden })
    }

    pub fn list_recursive(&mut self, target: &str) -> Result<TreeListing> {
        let logical = self.locate(target, false)?;
        self.load_known_children(&logical);
        let base = path::depth(&logical);
        let tree = self.store.subtree(&logical)?;
        let mut counts = TreeCounts::default();
        let entries = tree
            .walk()
            .into_iter()
            .map(|node| {
                if node.path != logical {
                    counts.record(node);
                }
                ListEntry::new(node, base)
            })
            .collect();
        Ok(TreeListing { entries, counts })
    }

    /// Load every manifest reachable from `path` without materializing.
    fn load_known_children(&mut self, path: &str) {
        if let Err(err) = self.ensure_children(path, false) {
            debug!(path, error = %format!("{err:#}"), "children not listed");
            return;
        }
        let children = match self.store.get_node(path) {
            Ok(node) => node.children.clone(),
            Err(_) => return,
        };
        for name in children {
            self.load_known_children(&path::join(path, &name));
        }
    }
}

/// One line per entry plus an "…and N more" line for hidden children.
pub fn render_listing(listing: &Listing) -> String {
    let mut out = String::new();
    for entry in &listing.entries {
        let _ = writeln!(out, "{} {}", entry.status.icon(), entry.name);
    }
    if listing.hidden > 0 {
        let _ = writeln!(out, "…and {} more", listing.hidden);
    }
    out
}

/// Indented tree with status icons and a closing summary line.
pub fn render_tree(listing: &TreeListing) -> String {
    let mut out = String::new();
    for entry in &listing.entries {
        if entry.depth == 0 {
            let name = if entry.path == path::ROOT {
                path::ROOT
            } else {
                entry.name.as_str()
            };
            let _ = writeln!(out, "{name}");
            continue;
        }
        let indent = "  ".repeat(entry.depth - 1);
        let _ = writeln!(out, "{indent}{} {}", entry.status.icon(), entry.name);
    }
    let counts = listing.counts;
    let _ = writeln!(
        out,
        "{} nodes: {} cloned, {} lazy",
        counts.total, counts.cloned, counts.lazy
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGit, TestWorkspace, manifest};
    use crate::tree::NodeDefinition;

    #[test]
    fn list_caps_at_preview_limit() {
        let nodes = (1..=7)
            .map(|i| NodeDefinition::repo(format!("r{i}"), format!("u{i}")))
            .collect();
        let ws = TestWorkspace::new(&manifest("root", "repos", nodes)).expect("workspace");
        let mut workspace = ws.open(FakeGit::new()).expect("open");

        let listing = workspace.list("/").expect("list");
        assert_eq!(listing.entries.len(), 5);
        assert_eq!(listing.hidden, 2);
        let rendered = render_listing(&listing);
        assert!(rendered.starts_with("⬇️ r1\n"));
        assert!(rendered.ends_with("…and 2 more\n"));
    }

    #[test]
    fn list_without_overflow_has_no_suffix() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![NodeDefinition::repo("a", "u-a")],
        ))
        .expect("workspace");
        let mut workspace = ws.open(FakeGit::new()).expect("open");
        let rendered = render_listing(&workspace.list("/").expect("list"));
        assert_eq!(rendered, "⬇️ a\n");
    }

    #[test]
    fn recursive_tree_shows_icons_and_summary() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![
                NodeDefinition::repo("platform", "u-platform"),
                NodeDefinition::repo("web", "u-web").lazy(),
                NodeDefinition::repo("docs", "u-docs"),
            ],
        ))
        .expect("workspace");
        ws.write_manifest(
            "repos/platform/grove.yaml",
            &manifest("platform", "repos", vec![NodeDefinition::repo("auth", "u-auth")]),
        )
        .expect("nested");
        ws.mkdir("repos/platform/repos/auth").expect("mkdir");

        let mut workspace = ws.open(FakeGit::new()).expect("open");
        let listing = workspace.list_recursive("/").expect("tree");

        assert_eq!(
            render_tree(&listing),
            "/\n✅ platform\n  ✅ auth\n💤 web\n⬇️ docs\n4 nodes: 2 cloned, 1 lazy\n"
        );
    }
}
