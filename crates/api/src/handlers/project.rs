//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plotweave_core::types::DbId;
use plotweave_db::models::project::{CreateProject, NarrativeProject, UpdateProject};
use plotweave_db::repositories::ProjectRepo;
use serde::{Deserialize, Deserializer};

use crate::error::AppResult;
use crate::handlers::access::{deleted_or_not_found, owned_project, updated_or_not_found};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /projects/{id}`.
///
/// `start_node_id` distinguishes "absent" (leave unchanged) from `null`
/// (clear the start node).
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(flatten)]
    pub fields: UpdateProject,
    #[serde(default, deserialize_with = "present")]
    pub start_node_id: Option<Option<DbId>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<DbId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DbId>::deserialize(deserializer).map(Some)
}

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<NarrativeProject>>)> {
    let project = ProjectRepo::create(&state.pool, user.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<NarrativeProject>>>> {
    let projects = ProjectRepo::list_by_owner(&state.pool, user.user_id).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<NarrativeProject>>> {
    let project = owned_project(&state.pool, id, &user).await?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/projects/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateProjectRequest>,
) -> AppResult<Json<DataResponse<NarrativeProject>>> {
    owned_project(&state.pool, id, &user).await?;

    let mut project = updated_or_not_found(
        ProjectRepo::update(&state.pool, id, &input.fields).await?,
        "project",
        id,
    )?;
    if let Some(start_node_id) = input.start_node_id {
        project = ProjectRepo::set_start_node(&state.pool, id, start_node_id).await?;
    }
    Ok(Json(DataResponse { data: project }))
}

/// DELETE /api/v1/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_project(&state.pool, id, &user).await?;
    deleted_or_not_found(ProjectRepo::delete(&state.pool, id).await?, "project", id)?;
    Ok(StatusCode::NO_CONTENT)
}
