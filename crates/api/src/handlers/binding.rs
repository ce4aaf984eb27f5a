//! Handlers for action bindings (the edges of the story graph).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plotweave_core::types::DbId;
use plotweave_db::models::binding::{
    ActionBinding, BindingWithAction, CreateActionBinding, UpdateActionBinding,
};
use plotweave_db::repositories::ActionBindingRepo;

use crate::error::AppResult;
use crate::handlers::access::{
    deleted_or_not_found, owned_binding, owned_node, updated_or_not_found,
};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/nodes/{node_id}/bindings
pub async fn list_by_source_node(
    State(state): State<AppState>,
    user: AuthUser,
    Path(node_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<BindingWithAction>>>> {
    owned_node(&state.pool, node_id, &user).await?;
    let bindings = ActionBindingRepo::list_by_source_node(&state.pool, node_id).await?;
    Ok(Json(DataResponse { data: bindings }))
}

/// POST /api/v1/nodes/{node_id}/bindings
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(node_id): Path<DbId>,
    Json(input): Json<CreateActionBinding>,
) -> AppResult<(StatusCode, Json<DataResponse<ActionBinding>>)> {
    owned_node(&state.pool, node_id, &user).await?;
    let binding = ActionBindingRepo::create(&state.pool, node_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: binding })))
}

/// PUT /api/v1/bindings/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateActionBinding>,
) -> AppResult<Json<DataResponse<ActionBinding>>> {
    owned_binding(&state.pool, id, &user).await?;
    let binding = updated_or_not_found(
        ActionBindingRepo::update(&state.pool, id, &input).await?,
        "binding",
        id,
    )?;
    Ok(Json(DataResponse { data: binding }))
}

/// DELETE /api/v1/bindings/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_binding(&state.pool, id, &user).await?;
    deleted_or_not_found(ActionBindingRepo::delete(&state.pool, id).await?, "binding", id)?;
    Ok(StatusCode::NO_CONTENT)
}
