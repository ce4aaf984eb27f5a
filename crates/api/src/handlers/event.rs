//! Handlers for events attached to nodes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plotweave_core::types::DbId;
use plotweave_db::models::event::{CreateEvent, NarrativeEvent, UpdateEvent};
use plotweave_db::repositories::EventRepo;

use crate::error::AppResult;
use crate::handlers::access::{deleted_or_not_found, owned_event, owned_node, updated_or_not_found};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/nodes/{node_id}/events
pub async fn list_by_node(
    State(state): State<AppState>,
    user: AuthUser,
    Path(node_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<NarrativeEvent>>>> {
    owned_node(&state.pool, node_id, &user).await?;
    let events = EventRepo::list_by_node(&state.pool, node_id).await?;
    Ok(Json(DataResponse { data: events }))
}

/// POST /api/v1/nodes/{node_id}/events
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(node_id): Path<DbId>,
    Json(input): Json<CreateEvent>,
) -> AppResult<(StatusCode, Json<DataResponse<NarrativeEvent>>)> {
    owned_node(&state.pool, node_id, &user).await?;
    let event = EventRepo::create(&state.pool, node_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: event })))
}

/// PUT /api/v1/events/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateEvent>,
) -> AppResult<Json<DataResponse<NarrativeEvent>>> {
    owned_event(&state.pool, id, &user).await?;
    let event =
        updated_or_not_found(EventRepo::update(&state.pool, id, &input).await?, "event", id)?;
    Ok(Json(DataResponse { data: event }))
}

/// DELETE /api/v1/events/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_event(&state.pool, id, &user).await?;
    deleted_or_not_found(EventRepo::delete(&state.pool, id).await?, "event", id)?;
    Ok(StatusCode::NO_CONTENT)
}
