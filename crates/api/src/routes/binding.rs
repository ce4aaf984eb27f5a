use axum::routing::put;
use axum::Router;

use crate::handlers::binding;
use crate::state::AppState;

/// Routes mounted at `/bindings`: `PUT /{id}` and `DELETE /{id}`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", put(binding::update).delete(binding::delete))
}
