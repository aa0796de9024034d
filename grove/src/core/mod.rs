//! Deterministic, pure logic for the workspace tree.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod invariants;
pub mod path;
pub mod status;
pub mod store;
pub mod types;
