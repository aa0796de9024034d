//! Typed failures raised by the tree engine.
//!
//! Functions return `anyhow::Result`; callers that need to tell failure
//! classes apart use [`GroveError::find`].

use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum GroveError {
    #[error("workspace not initialized (run `grove init` first)")]
    NotInitialized,

    #[error("path {path} does not exist: no node named '{segment}'")]
    PathNotFound { path: String, segment: String },

    #[error("path {path} does not exist on disk ({})", .physical.display())]
    PhysicalMissing { path: String, physical: PathBuf },

    #[error("config cycle detected: {}", display_chain(.chain))]
    ConfigCycle { chain: Vec<PathBuf> },

    #[error("clone {url} into {} failed", .dest.display())]
    CloneFailed {
        url: String,
        dest: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("git {action} failed for {path}")]
    GitAction {
        action: &'static str,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid manifest {}: {}", .file.display(), .problems.join("; "))]
    InvalidManifest { file: PathBuf, problems: Vec<String> },

    #[error("invalid node name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("node {path} already exists")]
    DuplicateNode { path: String },

    #[error("the root node cannot be removed")]
    RootImmutable,
}

impl GroveError {
    /// Locate a `GroveError` anywhere in an error chain.
    pub fn find(err: &anyhow::Error) -> Option<&GroveError> {
        err.chain().find_map(|cause| cause.downcast_ref::<GroveError>())
    }

    /// Errors that make an operation on the requested address impossible.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GroveError::NotInitialized
                | GroveError::PathNotFound { .. }
                | GroveError::PhysicalMissing { .. }
                | GroveError::ConfigCycle { .. }
                | GroveError::InvalidManifest { .. }
        )
    }
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn find_sees_through_context() {
        let err = Err::<(), _>(GroveError::NotInitialized)
            .context("open workspace")
            .unwrap_err();
        assert!(matches!(
            GroveError::find(&err),
            Some(GroveError::NotInitialized)
        ));
    }

    #[test]
    fn git_failures_are_not_fatal() {
        let git = GroveError::GitAction {
            action: "pull",
            path: "/api".to_string(),
            source: "exit status 1".into(),
        };
        assert!(!git.is_fatal());
        assert!(GroveError::ConfigCycle { chain: Vec::new() }.is_fatal());
    }

    #[test]
    fn cycle_message_lists_chain() {
        let err = GroveError::ConfigCycle {
            chain: vec![PathBuf::from("/w/a.yaml"), PathBuf::from("/w/a.yaml")],
        };
        assert_eq!(
            err.to_string(),
            "config cycle detected: /w/a.yaml -> /w/a.yaml"
        );
    }
}
