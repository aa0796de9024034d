//! Multi-repository workspace tree.
//!
//! A workspace is one logical tree of nodes declared in `grove.yaml`
//! manifests. Nodes are git repositories, references to further manifests,
//! or plain groups, and any of them may own children. The crate keeps the
//! same split throughout:
//!
//! - **[`core`]**: Pure logic over the tree (addresses, the tree store,
//!   manifest invariants, status classification). No I/O.
//! - **[`io`]**: Side effects (git subprocesses, manifest and state files,
//!   scaffolding). Behind traits where tests need to substitute them.
//!
//! [`workspace::Workspace`] ties the two together. Path resolution
//! ([`resolve`]), lazy child loading ([`loader`]), recursive git operations
//! ([`ops`]) and listings ([`list`]) are implemented on it.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod list;
pub mod loader;
pub mod logging;
pub mod ops;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
pub mod workspace;
