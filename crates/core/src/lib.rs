//! Plotweave domain layer.
//!
//! Pure logic with no I/O: entity kinds and field rules, the binding shape
//! validator, the snapshot document and its builder, the story graph arena
//! with reachability analysis, and history ledger rules. The `db` and `api`
//! crates build on these types.

pub mod binding;
pub mod error;
pub mod graph;
pub mod history;
pub mod snapshot;
pub mod story;
pub mod types;
