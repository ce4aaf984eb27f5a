//! Restore a project from a ledger entry.
//!
//! Shape of one rollback:
//!
//! 1. Outer transaction: lock the project row, load the target entry, decode
//!    and check its document, then capture the current state (pre-capture).
//! 2. Savepoint: tear down the current graph in dependency order and rebuild
//!    it from the document.
//! 3. Release the savepoint, append the pre-capture as a `rollback_point`
//!    ledger entry, commit.
//!
//! Any error drops both transactions, so entities and ledger are left exactly
//! as they were. Each phase reports failures as its own [`RollbackError`]
//! variant.

use std::collections::{HashMap, HashSet};
use std::fmt;

use plotweave_core::binding::validate_binding;
use plotweave_core::error::CoreError;
use plotweave_core::history::{
    rollback_point_description, ACTION_DELETE_BATCH_SIZE, ROLLBACK_POINT_OPERATION,
};
use plotweave_core::snapshot::{ActionState, SnapshotDocument, StructureCounts};
use plotweave_core::types::{new_id, DbId};
use serde::Serialize;
use sqlx::{Connection, PgConnection, PgPool};

use crate::models::history::HistorySummary;
use crate::repositories::{HistoryRepo, ProjectRepo, StoryGraphRepo};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Teardown steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    ClearStartNode,
    CollectActions,
    DeleteBindings,
    DeleteActions,
    DeleteEvents,
    DeleteNodes,
}

/// Reconstruction steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructStep {
    Nodes,
    Events,
    NodeParents,
    EventActions,
    Bindings,
    ProjectFields,
    StartNode,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeardownStep::ClearStartNode => "clear start node",
            TeardownStep::CollectActions => "collect actions",
            TeardownStep::DeleteBindings => "delete bindings",
            TeardownStep::DeleteActions => "delete actions",
            TeardownStep::DeleteEvents => "delete events",
            TeardownStep::DeleteNodes => "delete nodes",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ReconstructStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconstructStep::Nodes => "nodes",
            ReconstructStep::Events => "events",
            ReconstructStep::NodeParents => "node parents",
            ReconstructStep::EventActions => "event actions",
            ReconstructStep::Bindings => "bindings",
            ReconstructStep::ProjectFields => "project fields",
            ReconstructStep::StartNode => "start node",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("Project not found: {0}")]
    ProjectNotFound(DbId),

    #[error("Snapshot {snapshot_id} not found in project {project_id}")]
    SnapshotNotFound { project_id: DbId, snapshot_id: DbId },

    #[error("Snapshot document cannot be restored: {0}")]
    CorruptDocument(CoreError),

    #[error("Failed to capture current state: {0}")]
    PreCapture(#[source] sqlx::Error),

    #[error("Failed to encode current state: {0}")]
    Encode(CoreError),

    #[error("Teardown failed at '{step}': {source}")]
    Teardown {
        step: TeardownStep,
        #[source]
        source: sqlx::Error,
    },

    #[error("Reconstruction failed at '{step}': {source}")]
    Reconstruct {
        step: ReconstructStep,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to record rollback point: {0}")]
    Ledger(#[source] sqlx::Error),

    #[error("Transaction error: {0}")]
    Transaction(#[source] sqlx::Error),
}

impl From<RollbackError> for CoreError {
    fn from(err: RollbackError) -> Self {
        match err {
            RollbackError::ProjectNotFound(id) => CoreError::NotFound {
                entity: "project",
                id,
            },
            RollbackError::SnapshotNotFound { snapshot_id, .. } => CoreError::NotFound {
                entity: "snapshot",
                id: snapshot_id,
            },
            RollbackError::CorruptDocument(inner) => inner,
            RollbackError::Encode(inner) => inner,
            other => CoreError::TransactionFailure(other.to_string()),
        }
    }
}

fn teardown_err(step: TeardownStep) -> impl FnOnce(sqlx::Error) -> RollbackError {
    move |source| RollbackError::Teardown { step, source }
}

fn reconstruct_err(step: ReconstructStep) -> impl FnOnce(sqlx::Error) -> RollbackError {
    move |source| RollbackError::Reconstruct { step, source }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What the teardown removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeardownCounts {
    pub bindings: u64,
    pub actions: u64,
    pub events: u64,
    pub nodes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    pub snapshot_id: DbId,
    pub removed: TeardownCounts,
    pub restored: StructureCounts,
    /// Ledger entry holding the pre-rollback state.
    pub rollback_point: HistorySummary,
    /// Non-fatal problems, e.g. a start node that could not be restored.
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct RollbackExecutor;

impl RollbackExecutor {
    /// Replace the project's graph with the one stored in `snapshot_id`.
    pub async fn rollback(
        pool: &PgPool,
        project_id: DbId,
        snapshot_id: DbId,
        user_id: DbId,
    ) -> Result<RollbackOutcome, RollbackError> {
        match Self::run(pool, project_id, snapshot_id, user_id).await {
            Ok(outcome) => {
                tracing::info!(
                    project_id = %project_id,
                    snapshot_id = %snapshot_id,
                    rollback_point_id = %outcome.rollback_point.id,
                    nodes = outcome.restored.nodes,
                    events = outcome.restored.events,
                    bindings = outcome.restored.bindings,
                    warnings = outcome.warnings.len(),
                    "Rollback completed",
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    project_id = %project_id,
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "Rollback aborted, project left unchanged",
                );
                Err(e)
            }
        }
    }

    async fn run(
        pool: &PgPool,
        project_id: DbId,
        snapshot_id: DbId,
        user_id: DbId,
    ) -> Result<RollbackOutcome, RollbackError> {
        let mut tx = pool.begin().await.map_err(RollbackError::Transaction)?;

        ProjectRepo::lock(&mut tx, project_id)
            .await
            .map_err(RollbackError::Transaction)?
            .ok_or(RollbackError::ProjectNotFound(project_id))?;

        let target = HistoryRepo::find_in_project(&mut tx, project_id, snapshot_id)
            .await
            .map_err(RollbackError::Transaction)?
            .ok_or(RollbackError::SnapshotNotFound {
                project_id,
                snapshot_id,
            })?;
        let document = SnapshotDocument::from_value(target.snapshot_data)
            .map_err(RollbackError::CorruptDocument)?;
        check_document(&document).map_err(RollbackError::CorruptDocument)?;

        tracing::info!(project_id = %project_id, snapshot_id = %snapshot_id, "Rollback: pre-capture");
        let (current, capture_warnings) = StoryGraphRepo::capture(&mut tx, project_id)
            .await
            .map_err(RollbackError::PreCapture)?
            .ok_or(RollbackError::ProjectNotFound(project_id))?;
        let current = current.to_value().map_err(RollbackError::Encode)?;
        let mut warnings: Vec<String> =
            capture_warnings.iter().map(ToString::to_string).collect();

        let mut savepoint = tx.begin().await.map_err(RollbackError::Transaction)?;
        tracing::info!(project_id = %project_id, "Rollback: teardown");
        let removed = teardown(&mut savepoint, project_id).await?;
        tracing::info!(
            project_id = %project_id,
            nodes = document.nodes.len(),
            "Rollback: reconstruct",
        );
        let restored = reconstruct(&mut savepoint, project_id, &document, &mut warnings).await?;
        savepoint
            .commit()
            .await
            .map_err(RollbackError::Transaction)?;

        let description = rollback_point_description(target.operation_description.as_deref());
        let rollback_point = HistoryRepo::save_snapshot(
            &mut tx,
            project_id,
            user_id,
            &current,
            ROLLBACK_POINT_OPERATION,
            Some(&description),
            None,
        )
        .await
        .map_err(RollbackError::Ledger)?;

        tx.commit().await.map_err(RollbackError::Transaction)?;

        Ok(RollbackOutcome {
            snapshot_id,
            removed,
            restored,
            rollback_point: rollback_point.into(),
            warnings,
        })
    }
}

// ---------------------------------------------------------------------------
// Pre-flight
// ---------------------------------------------------------------------------

/// Reject documents that would write an illegal graph, before anything is
/// deleted.
fn check_document(doc: &SnapshotDocument) -> Result<(), CoreError> {
    let mut node_ids = HashSet::new();
    let mut event_ids = HashSet::new();
    for node in &doc.nodes {
        if !node_ids.insert(node.id) {
            return Err(CoreError::Validation(format!(
                "Snapshot contains node {} twice",
                node.id
            )));
        }
        for event in &node.events {
            if !event_ids.insert(event.id) {
                return Err(CoreError::Validation(format!(
                    "Snapshot contains event {} twice",
                    event.id
                )));
            }
            if event.actions.iter().any(|a| a.is_key_action) {
                return Err(CoreError::ConstraintViolation(format!(
                    "Snapshot event {} owns a key action",
                    event.id
                )));
            }
        }
    }
    for node in &doc.nodes {
        for binding in &node.outgoing_bindings {
            let (target_node, target_event) = binding.target.columns();
            validate_binding(binding.action.is_key_action, target_node, target_event)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

/// Delete the project's graph without ever leaving a live reference to a
/// deleted row. Template actions nobody binds are left alone.
async fn teardown(
    conn: &mut PgConnection,
    project_id: DbId,
) -> Result<TeardownCounts, RollbackError> {
    // The start node pointer must go before any node does.
    sqlx::query("UPDATE narrative_projects SET start_node_id = NULL WHERE id = $1")
        .bind(project_id)
        .execute(&mut *conn)
        .await
        .map_err(teardown_err(TeardownStep::ClearStartNode))?;

    // Collected up front: once bindings and events are gone these actions
    // can no longer be found.
    let action_ids: Vec<(DbId,)> = sqlx::query_as(
        "SELECT b.action_id FROM action_bindings b
         JOIN narrative_nodes n ON n.id = b.source_node_id
         WHERE n.project_id = $1
         UNION
         SELECT a.id FROM actions a
         JOIN narrative_events e ON e.id = a.event_id
         JOIN narrative_nodes n ON n.id = e.node_id
         WHERE n.project_id = $1",
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(teardown_err(TeardownStep::CollectActions))?;
    let action_ids: Vec<DbId> = action_ids.into_iter().map(|(id,)| id).collect();

    let mut counts = TeardownCounts::default();

    counts.bindings = sqlx::query(
        "DELETE FROM action_bindings
         WHERE source_node_id IN (SELECT id FROM narrative_nodes WHERE project_id = $1)",
    )
    .bind(project_id)
    .execute(&mut *conn)
    .await
    .map_err(teardown_err(TeardownStep::DeleteBindings))?
    .rows_affected();

    for batch in action_ids.chunks(ACTION_DELETE_BATCH_SIZE) {
        counts.actions += sqlx::query("DELETE FROM actions WHERE id = ANY($1)")
            .bind(batch)
            .execute(&mut *conn)
            .await
            .map_err(teardown_err(TeardownStep::DeleteActions))?
            .rows_affected();
    }

    counts.events = sqlx::query(
        "DELETE FROM narrative_events
         WHERE node_id IN (SELECT id FROM narrative_nodes WHERE project_id = $1)",
    )
    .bind(project_id)
    .execute(&mut *conn)
    .await
    .map_err(teardown_err(TeardownStep::DeleteEvents))?
    .rows_affected();

    counts.nodes = sqlx::query("DELETE FROM narrative_nodes WHERE project_id = $1")
        .bind(project_id)
        .execute(&mut *conn)
        .await
        .map_err(teardown_err(TeardownStep::DeleteNodes))?
        .rows_affected();

    tracing::debug!(
        project_id = %project_id,
        bindings = counts.bindings,
        actions = counts.actions,
        events = counts.events,
        nodes = counts.nodes,
        "Teardown finished",
    );
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Rebuild the graph from `doc`. Nodes and events keep their ids; bindings
/// and event sub-actions get fresh ones. A bound template that survived
/// teardown unbound is reused under its own id, so restoring never leaves a
/// stale copy behind. An action that appears more than once in the document
/// (an event sub-choice that is also bound, or a template bound twice) is
/// recreated once and shared.
async fn reconstruct(
    conn: &mut PgConnection,
    project_id: DbId,
    doc: &SnapshotDocument,
    warnings: &mut Vec<String>,
) -> Result<StructureCounts, RollbackError> {
    let mut counts = StructureCounts::default();

    // Pass 1: nodes then their events. Parents are linked afterwards since a
    // parent may appear later in the document.
    for node in &doc.nodes {
        sqlx::query(
            "INSERT INTO narrative_nodes (id, project_id, scene, node_type, level, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(node.id)
        .bind(project_id)
        .bind(&node.scene)
        .bind(node.node_type.as_str())
        .bind(node.level)
        .bind(&node.metadata)
        .execute(&mut *conn)
        .await
        .map_err(reconstruct_err(ReconstructStep::Nodes))?;
        counts.nodes += 1;

        for event in &node.events {
            sqlx::query(
                "INSERT INTO narrative_events
                    (id, node_id, speaker, content, description, occurred_at, event_type, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(event.id)
            .bind(node.id)
            .bind(&event.speaker)
            .bind(&event.content)
            .bind(&event.description)
            .bind(event.occurred_at)
            .bind(event.event_type.as_str())
            .bind(&event.metadata)
            .execute(&mut *conn)
            .await
            .map_err(reconstruct_err(ReconstructStep::Events))?;
            counts.events += 1;
        }
    }

    for node in &doc.nodes {
        let Some(parent_id) = node.parent_node_id else {
            continue;
        };
        if !doc.contains_node(parent_id) {
            let msg = format!("node {} lost its parent {parent_id}, not in snapshot", node.id);
            tracing::warn!(project_id = %project_id, node_id = %node.id, "Parent node missing from snapshot");
            warnings.push(msg);
            continue;
        }
        sqlx::query("UPDATE narrative_nodes SET parent_node_id = $2 WHERE id = $1")
            .bind(node.id)
            .bind(parent_id)
            .execute(&mut *conn)
            .await
            .map_err(reconstruct_err(ReconstructStep::NodeParents))?;
    }

    // Pass 2: actions and bindings, now that every target exists.
    let mut fresh_ids: HashMap<DbId, DbId> = HashMap::new();
    for node in &doc.nodes {
        for event in &node.events {
            for action in &event.actions {
                let id = new_id();
                sqlx::query(
                    "INSERT INTO actions
                        (id, project_id, event_id, description, is_key_action, metadata)
                     VALUES ($1, $2, $3, $4, false, $5)",
                )
                .bind(id)
                .bind(project_id)
                .bind(event.id)
                .bind(&action.description)
                .bind(&action.metadata)
                .execute(&mut *conn)
                .await
                .map_err(reconstruct_err(ReconstructStep::EventActions))?;
                fresh_ids.insert(action.id, id);
                counts.actions += 1;
            }
        }
    }

    for node in &doc.nodes {
        for binding in &node.outgoing_bindings {
            let action_id = match fresh_ids.get(&binding.action.id).copied() {
                Some(id) => id,
                None => {
                    let id = if reuse_template(&mut *conn, project_id, &binding.action).await? {
                        binding.action.id
                    } else {
                        let id = new_id();
                        sqlx::query(
                            "INSERT INTO actions
                                (id, project_id, description, is_key_action, metadata)
                             VALUES ($1, $2, $3, $4, $5)",
                        )
                        .bind(id)
                        .bind(project_id)
                        .bind(&binding.action.description)
                        .bind(binding.action.is_key_action)
                        .bind(&binding.action.metadata)
                        .execute(&mut *conn)
                        .await
                        .map_err(reconstruct_err(ReconstructStep::Bindings))?;
                        id
                    };
                    fresh_ids.insert(binding.action.id, id);
                    counts.actions += 1;
                    id
                }
            };

            let (target_node_id, target_event_id) = binding.target.columns();
            sqlx::query(
                "INSERT INTO action_bindings
                    (id, action_id, source_node_id, target_node_id, target_event_id)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(new_id())
            .bind(action_id)
            .bind(node.id)
            .bind(target_node_id)
            .bind(target_event_id)
            .execute(&mut *conn)
            .await
            .map_err(reconstruct_err(ReconstructStep::Bindings))?;
            counts.bindings += 1;
        }
    }

    sqlx::query(
        "UPDATE narrative_projects SET title = $2, description = $3, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(project_id)
    .bind(&doc.project.title)
    .bind(&doc.project.description)
    .execute(&mut *conn)
    .await
    .map_err(reconstruct_err(ReconstructStep::ProjectFields))?;

    match doc.project.start_node_id {
        Some(start) if doc.contains_node(start) => {
            sqlx::query("UPDATE narrative_projects SET start_node_id = $2 WHERE id = $1")
                .bind(project_id)
                .bind(start)
                .execute(&mut *conn)
                .await
                .map_err(reconstruct_err(ReconstructStep::StartNode))?;
        }
        Some(start) => {
            tracing::warn!(
                project_id = %project_id,
                start_node_id = %start,
                "Start node not present in snapshot, leaving it unset",
            );
            warnings.push(format!(
                "start node {start} is not part of the snapshot and was left unset"
            ));
        }
        None => {}
    }

    Ok(counts)
}

/// Overwrite a surviving template with the snapshot's version of it.
/// Returns `false` if no unbound template with that id is left in the project.
async fn reuse_template(
    conn: &mut PgConnection,
    project_id: DbId,
    action: &ActionState,
) -> Result<bool, RollbackError> {
    let result = sqlx::query(
        "UPDATE actions SET
            description = $3,
            is_key_action = $4,
            metadata = $5,
            updated_at = NOW()
         WHERE id = $1 AND project_id = $2 AND event_id IS NULL",
    )
    .bind(action.id)
    .bind(project_id)
    .bind(&action.description)
    .bind(action.is_key_action)
    .bind(&action.metadata)
    .execute(conn)
    .await
    .map_err(reconstruct_err(ReconstructStep::Bindings))?;
    Ok(result.rows_affected() > 0)
}
