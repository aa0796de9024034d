//! Node status classification used by listings.

use crate::tree::NodeInfo;

/// Presentation state derived from `{is_lazy, is_cloned, has_changes}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Lazy node that has not been materialized.
    LazyPending,
    /// Eager node whose directory is missing.
    Missing,
    Clean,
    Modified,
}

impl NodeStatus {
    pub fn of(node: &NodeInfo) -> Self {
        match (node.is_cloned, node.is_lazy, node.has_changes) {
            (false, true, _) => NodeStatus::LazyPending,
            (false, false, _) => NodeStatus::Missing,
            (true, _, true) => NodeStatus::Modified,
            (true, _, false) => NodeStatus::Clean,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            NodeStatus::LazyPending => "💤",
            NodeStatus::Missing => "⬇️",
            NodeStatus::Clean => "✅",
            NodeStatus::Modified => "📝",
        }
    }
}

/// Totals for a listed subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeCounts {
    pub total: usize,
    pub cloned: usize,
    /// Lazy nodes still waiting to be materialized.
    pub lazy: usize,
}

impl TreeCounts {
    pub fn record(&mut self, node: &NodeInfo) {
        self.total += 1;
        if node.is_cloned {
            self.cloned += 1;
        } else if node.is_lazy {
            self.lazy += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeDefinition;

    fn node(lazy: bool, cloned: bool, changes: bool) -> NodeInfo {
        let mut def = NodeDefinition::repo("r", "u");
        if lazy {
            def = def.lazy();
        }
        let mut node = NodeInfo::from_definition("/", &def);
        node.is_cloned = cloned;
        node.has_changes = changes;
        node
    }

    #[test]
    fn status_follows_flags() {
        assert_eq!(NodeStatus::of(&node(true, false, false)), NodeStatus::LazyPending);
        assert_eq!(NodeStatus::of(&node(false, false, false)), NodeStatus::Missing);
        assert_eq!(NodeStatus::of(&node(true, true, false)), NodeStatus::Clean);
        assert_eq!(NodeStatus::of(&node(false, true, true)), NodeStatus::Modified);
    }

    #[test]
    fn counts_split_cloned_and_pending_lazy() {
        let mut counts = TreeCounts::default();
        counts.record(&node(true, false, false));
        counts.record(&node(true, true, false));
        counts.record(&node(false, false, false));
        assert_eq!(
            counts,
            TreeCounts {
                total: 3,
                cloned: 1,
                lazy: 1
            }
        );
    }
}
