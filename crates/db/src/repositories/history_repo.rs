//! Repository for the `story_edit_history` ledger.
//!
//! The ledger is append-only and capped at [`MAX_HISTORY_ENTRIES`] per
//! project: each insert first deletes everything beyond the newest
//! `MAX_HISTORY_ENTRIES - 1` rows.

use plotweave_core::history::{
    retained_before_insert, validate_operation_description, validate_operation_type,
    MAX_HISTORY_ENTRIES,
};
use plotweave_core::snapshot::SnapshotWarning;
use plotweave_core::types::{new_id, DbId};
use sqlx::{PgConnection, PgPool};

use crate::error::StoreError;
use crate::models::history::{CreateSnapshot, HistoryEntry, HistorySummary};
use crate::repositories::{ProjectRepo, StoryGraphRepo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, user_id, operation_type, operation_description, \
    affected_node_id, snapshot_data, created_at";

/// Same as [`COLUMNS`] without the document.
const SUMMARY_COLUMNS: &str = "id, project_id, user_id, operation_type, operation_description, \
    affected_node_id, created_at";

/// Provides ledger operations for project snapshots.
pub struct HistoryRepo;

impl HistoryRepo {
    /// Capture the project's current state and append it to the ledger.
    ///
    /// Runs under the project lock so the capture sees a consistent graph.
    /// Sub-entities that could not be serialized are returned as warnings.
    pub async fn create_snapshot(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
        input: &CreateSnapshot,
    ) -> Result<(HistoryEntry, Vec<SnapshotWarning>), StoreError> {
        validate_operation_type(&input.operation_type)?;
        validate_operation_description(input.operation_description.as_deref())?;

        let mut tx = pool.begin().await?;
        ProjectRepo::lock(&mut tx, project_id)
            .await?
            .ok_or_else(|| StoreError::not_found("project", project_id))?;
        let (document, warnings) = StoryGraphRepo::capture(&mut tx, project_id)
            .await?
            .ok_or_else(|| StoreError::not_found("project", project_id))?;
        let data = document.to_value()?;

        let entry = Self::save_snapshot(
            &mut tx,
            project_id,
            user_id,
            &data,
            &input.operation_type,
            input.operation_description.as_deref(),
            input.affected_node_id,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project_id,
            snapshot_id = %entry.id,
            operation_type = %entry.operation_type,
            nodes = document.nodes.len(),
            warnings = warnings.len(),
            "Snapshot created",
        );
        Ok((entry, warnings))
    }

    /// Append a document to the ledger, pruning the oldest entries first so
    /// the project never holds more than [`MAX_HISTORY_ENTRIES`].
    pub async fn save_snapshot(
        conn: &mut PgConnection,
        project_id: DbId,
        user_id: DbId,
        document: &serde_json::Value,
        operation_type: &str,
        operation_description: Option<&str>,
        affected_node_id: Option<DbId>,
    ) -> Result<HistoryEntry, sqlx::Error> {
        let pruned = sqlx::query(
            "DELETE FROM story_edit_history
             WHERE project_id = $1
               AND id NOT IN (
                   SELECT id FROM story_edit_history
                   WHERE project_id = $1
                   ORDER BY created_at DESC, id DESC
                   LIMIT $2
               )",
        )
        .bind(project_id)
        .bind(retained_before_insert())
        .execute(&mut *conn)
        .await?;
        if pruned.rows_affected() > 0 {
            tracing::info!(
                project_id = %project_id,
                count = pruned.rows_affected(),
                "Pruned old history entries",
            );
        }

        let query = format!(
            "INSERT INTO story_edit_history
                (id, project_id, user_id, operation_type, operation_description,
                 affected_node_id, snapshot_data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(new_id())
            .bind(project_id)
            .bind(user_id)
            .bind(operation_type)
            .bind(operation_description)
            .bind(affected_node_id)
            .bind(document)
            .fetch_one(&mut *conn)
            .await
    }

    /// Newest-first ledger listing. `limit` is clamped to the ledger cap.
    pub async fn list(
        pool: &PgPool,
        project_id: DbId,
        limit: i64,
    ) -> Result<Vec<HistorySummary>, sqlx::Error> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM story_edit_history
             WHERE project_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, HistorySummary>(&query)
            .bind(project_id)
            .bind(limit.clamp(1, MAX_HISTORY_ENTRIES))
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool, project_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM story_edit_history WHERE project_id = $1")
                .bind(project_id)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    pub async fn latest(pool: &PgPool, project_id: DbId) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM story_edit_history
             WHERE project_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a ledger entry, scoped to the project it must belong to.
    pub async fn find_in_project(
        conn: &mut PgConnection,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<HistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM story_edit_history WHERE id = $1 AND project_id = $2"
        );
        sqlx::query_as::<_, HistoryEntry>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(conn)
            .await
    }

    /// Remove one entry. Missing or foreign-project entries are `NotFound`.
    pub async fn delete(pool: &PgPool, project_id: DbId, id: DbId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM story_edit_history WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("snapshot", id));
        }
        tracing::info!(project_id = %project_id, snapshot_id = %id, "Snapshot deleted");
        Ok(())
    }
}
