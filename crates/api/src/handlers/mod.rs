//! Request handlers.
//!
//! Each submodule serves one resource. Handlers check project ownership
//! through [`access`], delegate to the matching repository in
//! `plotweave_db` and map errors via [`AppError`](crate::error::AppError).

pub mod access;
pub mod action;
pub mod binding;
pub mod event;
pub mod graph;
pub mod history;
pub mod node;
pub mod project;
