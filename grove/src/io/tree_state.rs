//! Persisted navigation state.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::TreeState;

/// Load tree state from disk; a missing file yields the default (root).
pub fn load_tree_state(path: &Path) -> Result<TreeState> {
    if !path.exists() {
        debug!(path = %path.display(), "no tree state, starting at root");
        return Ok(TreeState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read tree state {}", path.display()))?;
    let state: TreeState = serde_json::from_str(&contents)
        .with_context(|| format!("parse tree state {}", path.display()))?;
    debug!(current_path = %state.current_path, "tree state loaded");
    Ok(state)
}

/// Atomically write tree state to disk (temp file + rename).
pub fn write_tree_state(path: &Path, state: &TreeState) -> Result<()> {
    debug!(path = %path.display(), current_path = %state.current_path, "writing tree state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_defaults_to_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = load_tree_state(&temp.path().join("state.json")).expect("load");
        assert_eq!(state.current_path, "/");
    }

    /// Guards the on-disk format against accidental field renames.
    #[test]
    fn tree_state_format_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        let state = TreeState {
            current_path: "/backend/svc".to_string(),
        };
        write_tree_state(&path, &state).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "{\n  \"current_path\": \"/backend/svc\"\n}\n");
        assert_eq!(load_tree_state(&path).expect("load"), state);
    }
}
