//! Route definitions for the `/projects` resource and everything scoped to
//! a single project.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{action, graph, history, node, project};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                                  -> list
/// POST   /                                  -> create
/// GET    /{id}                              -> get_by_id
/// PUT    /{id}                              -> update
/// DELETE /{id}                              -> delete
///
/// GET    /{id}/nodes                        -> node::list_by_project
/// POST   /{id}/nodes                        -> node::create
/// POST   /{id}/actions                      -> action::create_template
///
/// GET    /{id}/graph/reachable              -> graph::reachable
/// GET    /{id}/graph/unreachable            -> graph::unreachable
/// GET    /{id}/graph/validate               -> graph::validate
/// GET    /{id}/graph/stats                  -> graph::stats
/// GET    /{id}/graph/document               -> graph::document
///
/// GET    /{id}/history                      -> history::list
/// POST   /{id}/history/snapshot             -> history::create_snapshot
/// POST   /{id}/history/rollback             -> history::rollback
/// DELETE /{id}/history/{snapshot_id}        -> history::delete
/// ```
pub fn router() -> Router<AppState> {
    let graph_routes = Router::new()
        .route("/reachable", get(graph::reachable))
        .route("/unreachable", get(graph::unreachable))
        .route("/validate", get(graph::validate))
        .route("/stats", get(graph::stats))
        .route("/document", get(graph::document));

    let history_routes = Router::new()
        .route("/", get(history::list))
        .route("/snapshot", post(history::create_snapshot))
        .route("/rollback", post(history::rollback))
        .route("/{snapshot_id}", delete(history::delete));

    Router::new()
        .route("/", get(project::list).post(project::create))
        .route(
            "/{id}",
            get(project::get_by_id)
                .put(project::update)
                .delete(project::delete),
        )
        .route("/{id}/nodes", get(node::list_by_project).post(node::create))
        .route("/{id}/actions", post(action::create_template))
        .nest("/{id}/graph", graph_routes)
        .nest("/{id}/history", history_routes)
}
