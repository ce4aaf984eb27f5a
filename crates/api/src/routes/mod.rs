pub mod action;
pub mod binding;
pub mod event;
pub mod health;
pub mod node;
pub mod project;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route requires the `X-User-Id` header and checks that the caller
/// owns the project the addressed row belongs to.
///
/// ```text
/// /projects                                 list, create
/// /projects/{id}                            get, update, delete
/// /projects/{id}/nodes                      list, create
/// /projects/{id}/actions                    create template action
/// /projects/{id}/graph/...                  reachable, unreachable, validate, stats, document
/// /projects/{id}/history                    list
/// /projects/{id}/history/snapshot           capture (POST)
/// /projects/{id}/history/rollback           restore (POST)
/// /projects/{id}/history/{snapshot_id}      delete
///
/// /nodes/{id}                               get, update, delete
/// /nodes/{id}/events                        list, create
/// /nodes/{id}/branches                      add branch (POST)
/// /nodes/{id}/bindings                      list, create
///
/// /events/{id}                              update, delete
/// /events/{id}/actions                      create sub-choice (POST)
///
/// /actions/{id}                             update, delete
/// /bindings/{id}                            update, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", project::router())
        .nest("/nodes", node::router())
        .nest("/events", event::router())
        .nest("/actions", action::router())
        .nest("/bindings", binding::router())
}
