//! Read-only graph analysis endpoints for a project.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::Json;
use plotweave_core::error::CoreError;
use plotweave_core::graph::{GraphIssues, GraphStats, StoryGraph};
use plotweave_core::snapshot::{SnapshotDocument, SnapshotWarning};
use plotweave_core::types::DbId;
use plotweave_db::repositories::StoryGraphRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::access::owned_project;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct NodeSetResponse {
    pub start_node_id: Option<DbId>,
    pub node_ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub is_clean: bool,
    #[serde(flatten)]
    pub issues: GraphIssues,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub document: SnapshotDocument,
    pub warnings: Vec<SnapshotWarning>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_graph(state: &AppState, project_id: DbId, user: &AuthUser) -> AppResult<StoryGraph> {
    owned_project(&state.pool, project_id, user).await?;
    StoryGraphRepo::load_graph(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "project",
            id: project_id,
        }))
}

fn node_set(graph: &StoryGraph, ids: BTreeSet<DbId>) -> NodeSetResponse {
    NodeSetResponse {
        start_node_id: graph.start_node_id(),
        node_ids: ids.into_iter().collect(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{project_id}/graph/reachable
pub async fn reachable(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<NodeSetResponse>>> {
    let graph = load_graph(&state, project_id, &user).await?;
    let ids = graph.reachable_nodes();
    Ok(Json(DataResponse {
        data: node_set(&graph, ids),
    }))
}

/// GET /api/v1/projects/{project_id}/graph/unreachable
pub async fn unreachable(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<NodeSetResponse>>> {
    let graph = load_graph(&state, project_id, &user).await?;
    let ids = graph.unreachable_nodes();
    Ok(Json(DataResponse {
        data: node_set(&graph, ids),
    }))
}

/// GET /api/v1/projects/{project_id}/graph/validate
pub async fn validate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ValidationReport>>> {
    let graph = load_graph(&state, project_id, &user).await?;
    let issues = graph.validate();
    Ok(Json(DataResponse {
        data: ValidationReport {
            is_clean: issues.is_clean(),
            issues,
        },
    }))
}

/// GET /api/v1/projects/{project_id}/graph/stats
pub async fn stats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<GraphStats>>> {
    let graph = load_graph(&state, project_id, &user).await?;
    Ok(Json(DataResponse {
        data: graph.stats(),
    }))
}

/// GET /api/v1/projects/{project_id}/graph/document
///
/// The structural document a snapshot taken now would store.
pub async fn document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<DocumentResponse>>> {
    owned_project(&state.pool, project_id, &user).await?;
    let (document, warnings) = StoryGraphRepo::load_document(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "project",
            id: project_id,
        }))?;
    Ok(Json(DataResponse {
        data: DocumentResponse { document, warnings },
    }))
}
