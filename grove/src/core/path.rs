//! Logical tree addresses.
//!
//! Logical paths are `/`-separated node names rooted at `/`. They never map
//! 1:1 onto directories (see `resolve`), so everything here is string-level.

use crate::error::GroveError;

pub const ROOT: &str = "/";

/// One navigation step of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `..`: move to the parent, clamped at root.
    Parent,
    /// Child lookup by exact name.
    Name(String),
}

/// A parsed target address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Start from root (`/`, `~`) instead of the current position.
    pub absolute: bool,
    pub segments: Vec<Segment>,
}

/// Parse a user-supplied address.
///
/// `""` and `"."` address the current node; `"/"` and `"~"` address root.
/// Doubled and trailing slashes are ignored, `.` segments are dropped and
/// `..` is kept as a navigation step.
pub fn parse_address(target: &str) -> Address {
    let target = target.trim();
    let (absolute, rest) = match target.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => (true, rest),
        _ => (target.starts_with('/'), target),
    };
    let segments = rest
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(|part| {
            if part == ".." {
                Segment::Parent
            } else {
                Segment::Name(part.to_string())
            }
        })
        .collect();
    Address { absolute, segments }
}

/// Logical path of child `name` under `parent`.
pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Logical parent of `path`; `None` for root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some(ROOT),
        Some((prefix, _)) => Some(prefix),
        None => Some(ROOT),
    }
}

/// Node names along `path`, root excluded.
pub fn names(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

pub fn depth(path: &str) -> usize {
    names(path).count()
}

/// Last segment of `path` (empty for root).
pub fn leaf_name(path: &str) -> &str {
    names(path).last().unwrap_or("")
}

/// All logical paths from root down to `path`, inclusive.
pub fn lineage(path: &str) -> Vec<String> {
    let mut out = vec![ROOT.to_string()];
    let mut current = ROOT.to_string();
    for name in names(path) {
        current = join(&current, name);
        out.push(current.clone());
    }
    out
}

/// Reject names that cannot be a single path segment or directory name.
pub fn validate_name(name: &str) -> Result<(), GroveError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.trim() != name {
        Some("name has surrounding whitespace")
    } else if matches!(name, "." | ".." | "~") {
        Some("name is reserved for navigation")
    } else if name.contains('/') || name.contains('\\') {
        Some("name contains a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(GroveError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
