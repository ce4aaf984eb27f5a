//! Route definitions for the `/events` resource.

use axum::routing::{post, put};
use axum::Router;

use crate::handlers::{action, event};
use crate::state::AppState;

/// Routes mounted at `/events`.
///
/// ```text
/// PUT    /{id}                 -> update
/// DELETE /{id}                 -> delete
/// POST   /{id}/actions         -> action::create_for_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(event::update).delete(event::delete))
        .route("/{id}/actions", post(action::create_for_event))
}
