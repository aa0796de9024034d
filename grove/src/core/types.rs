//! Shared deterministic types for the tree engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::path::ROOT;

/// Persisted navigation state (`.grove/state.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeState {
    /// Last logical position recorded by `navigate`.
    pub current_path: String,
}

impl Default for TreeState {
    fn default() -> Self {
        Self {
            current_path: ROOT.to_string(),
        }
    }
}

/// Git action applied per node by the recursive executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Pull,
    Push,
    Status,
    /// Materialize only; no git action on nodes that already exist.
    Clone,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Pull => "pull",
            Operation::Push => "push",
            Operation::Status => "status",
            Operation::Clone => "clone",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
