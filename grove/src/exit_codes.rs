//! Stable exit codes for grove CLI commands.

/// Command succeeded. Per-node failures during a traversal still exit with this.
pub const OK: i32 = 0;
/// Command failed: workspace not initialized, unresolvable address, invalid
/// manifest or arguments, or any other fatal error.
pub const INVALID: i32 = 1;
