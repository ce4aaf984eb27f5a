//! Handlers for the per-project history ledger and rollback.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use plotweave_core::history::MAX_HISTORY_ENTRIES;
use plotweave_core::snapshot::SnapshotWarning;
use plotweave_core::types::DbId;
use plotweave_db::models::history::{CreateSnapshot, HistorySummary};
use plotweave_db::repositories::HistoryRepo;
use plotweave_db::rollback::{RollbackExecutor, RollbackOutcome};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::access::owned_project;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub snapshot_id: DbId,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub entry: HistorySummary,
    /// Sub-entities left out of the document because they were malformed.
    pub warnings: Vec<SnapshotWarning>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{project_id}/history
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<DataResponse<Vec<HistorySummary>>>> {
    owned_project(&state.pool, project_id, &user).await?;
    let limit = params.limit.unwrap_or(MAX_HISTORY_ENTRIES);
    let entries = HistoryRepo::list(&state.pool, project_id, limit).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// POST /api/v1/projects/{project_id}/history/snapshot
pub async fn create_snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateSnapshot>,
) -> AppResult<(StatusCode, Json<DataResponse<SnapshotResponse>>)> {
    owned_project(&state.pool, project_id, &user).await?;
    let (entry, warnings) =
        HistoryRepo::create_snapshot(&state.pool, project_id, user.user_id, &input).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SnapshotResponse {
                entry: entry.into(),
                warnings,
            },
        }),
    ))
}

/// POST /api/v1/projects/{project_id}/history/rollback
pub async fn rollback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<RollbackRequest>,
) -> AppResult<Json<DataResponse<RollbackOutcome>>> {
    owned_project(&state.pool, project_id, &user).await?;
    let outcome =
        RollbackExecutor::rollback(&state.pool, project_id, input.snapshot_id, user.user_id)
            .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// DELETE /api/v1/projects/{project_id}/history/{snapshot_id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, snapshot_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    owned_project(&state.pool, project_id, &user).await?;
    HistoryRepo::delete(&state.pool, project_id, snapshot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
