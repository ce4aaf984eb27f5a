//! Route definitions for the `/nodes` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{binding, event, node};
use crate::state::AppState;

/// Routes mounted at `/nodes`.
///
/// ```text
/// GET    /{id}                 -> get_by_id
/// PUT    /{id}                 -> update
/// DELETE /{id}                 -> delete
/// GET    /{id}/events          -> event::list_by_node
/// POST   /{id}/events          -> event::create
/// POST   /{id}/branches        -> add_branch
/// GET    /{id}/bindings        -> binding::list_by_source_node
/// POST   /{id}/bindings        -> binding::create
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(node::get_by_id).put(node::update).delete(node::delete),
        )
        .route("/{id}/events", get(event::list_by_node).post(event::create))
        .route("/{id}/branches", post(node::add_branch))
        .route(
            "/{id}/bindings",
            get(binding::list_by_source_node).post(binding::create),
        )
}
