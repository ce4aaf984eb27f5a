//! Handlers for story nodes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plotweave_core::types::DbId;
use plotweave_db::models::node::{CreateNode, NarrativeNode, NewBranch, UpdateNode};
use plotweave_db::repositories::NodeRepo;
use serde::Deserialize;

use crate::error::AppResult;
use crate::handlers::access::{deleted_or_not_found, owned_node, owned_project, updated_or_not_found};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /nodes/{id}/branches`.
#[derive(Debug, Deserialize)]
pub struct AddBranchRequest {
    pub choices: Vec<NewBranch>,
}

/// GET /api/v1/projects/{project_id}/nodes
pub async fn list_by_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<NarrativeNode>>>> {
    owned_project(&state.pool, project_id, &user).await?;
    let nodes = NodeRepo::list_by_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: nodes }))
}

/// POST /api/v1/projects/{project_id}/nodes
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateNode>,
) -> AppResult<(StatusCode, Json<DataResponse<NarrativeNode>>)> {
    owned_project(&state.pool, project_id, &user).await?;
    let node = NodeRepo::create(&state.pool, project_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: node })))
}

/// GET /api/v1/nodes/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<NarrativeNode>>> {
    let node = owned_node(&state.pool, id, &user).await?;
    Ok(Json(DataResponse { data: node }))
}

/// PUT /api/v1/nodes/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateNode>,
) -> AppResult<Json<DataResponse<NarrativeNode>>> {
    owned_node(&state.pool, id, &user).await?;
    let node = updated_or_not_found(NodeRepo::update(&state.pool, id, &input).await?, "node", id)?;
    Ok(Json(DataResponse { data: node }))
}

/// DELETE /api/v1/nodes/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_node(&state.pool, id, &user).await?;
    deleted_or_not_found(NodeRepo::delete(&state.pool, id).await?, "node", id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/nodes/{id}/branches
///
/// Creates one child node per choice, each reached by a new key action.
pub async fn add_branch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<AddBranchRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Vec<NarrativeNode>>>)> {
    owned_node(&state.pool, id, &user).await?;
    let nodes = NodeRepo::add_branch(&state.pool, id, &input.choices).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: nodes })))
}
