//! Handlers for actions: project-level templates and event sub-choices.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plotweave_core::types::DbId;
use plotweave_db::models::action::{Action, CreateAction, UpdateAction};
use plotweave_db::repositories::ActionRepo;

use crate::error::AppResult;
use crate::handlers::access::{
    deleted_or_not_found, owned_action, owned_event, owned_project, updated_or_not_found,
};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/projects/{project_id}/actions
///
/// Creates a standalone action that bindings can later reference.
pub async fn create_template(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateAction>,
) -> AppResult<(StatusCode, Json<DataResponse<Action>>)> {
    owned_project(&state.pool, project_id, &user).await?;
    let action = ActionRepo::create(&state.pool, project_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: action })))
}

/// POST /api/v1/events/{event_id}/actions
pub async fn create_for_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<DbId>,
    Json(input): Json<CreateAction>,
) -> AppResult<(StatusCode, Json<DataResponse<Action>>)> {
    owned_event(&state.pool, event_id, &user).await?;
    let action = ActionRepo::create_for_event(&state.pool, event_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: action })))
}

/// PUT /api/v1/actions/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateAction>,
) -> AppResult<Json<DataResponse<Action>>> {
    owned_action(&state.pool, id, &user).await?;
    let action =
        updated_or_not_found(ActionRepo::update(&state.pool, id, &input).await?, "action", id)?;
    Ok(Json(DataResponse { data: action }))
}

/// DELETE /api/v1/actions/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_action(&state.pool, id, &user).await?;
    deleted_or_not_found(ActionRepo::delete(&state.pool, id).await?, "action", id)?;
    Ok(StatusCode::NO_CONTENT)
}
