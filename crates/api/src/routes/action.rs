use axum::routing::put;
use axum::Router;

use crate::handlers::action;
use crate::state::AppState;

/// Routes mounted at `/actions`: `PUT /{id}` and `DELETE /{id}`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", put(action::update).delete(action::delete))
}
