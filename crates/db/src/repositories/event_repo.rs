//! Repository for the `narrative_events` table.

use plotweave_core::error::CoreError;
use plotweave_core::story::{validate_metadata, EventType};
use plotweave_core::types::{new_id, DbId};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::event::{CreateEvent, NarrativeEvent, UpdateEvent};
use crate::repositories::node_repo::delete_unused_templates;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, node_id, speaker, content, description, occurred_at, \
    event_type, metadata, created_at, updated_at";

/// Provides CRUD operations for narrative events.
pub struct EventRepo;

impl EventRepo {
    /// Attach an event to a node.
    pub async fn create(
        pool: &PgPool,
        node_id: DbId,
        input: &CreateEvent,
    ) -> Result<NarrativeEvent, StoreError> {
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }
        let exists: Option<(DbId,)> = sqlx::query_as("SELECT id FROM narrative_nodes WHERE id = $1")
            .bind(node_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("node", node_id));
        }

        let query = format!(
            "INSERT INTO narrative_events
                (id, node_id, speaker, content, description, occurred_at, event_type, metadata)
             VALUES ($1, $2, COALESCE($3, ''), $4, $5, COALESCE($6, NOW()), $7,
                     COALESCE($8, '{{}}'::jsonb))
             RETURNING {COLUMNS}"
        );
        let event = sqlx::query_as::<_, NarrativeEvent>(&query)
            .bind(new_id())
            .bind(node_id)
            .bind(&input.speaker)
            .bind(&input.content)
            .bind(&input.description)
            .bind(input.occurred_at)
            .bind(input.event_type.unwrap_or_default().as_str())
            .bind(&input.metadata)
            .fetch_one(pool)
            .await?;
        tracing::info!(node_id = %node_id, event_id = %event.id, "Event attached");
        Ok(event)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<NarrativeEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM narrative_events WHERE id = $1");
        sqlx::query_as::<_, NarrativeEvent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a node's events in story order.
    pub async fn list_by_node(
        pool: &PgPool,
        node_id: DbId,
    ) -> Result<Vec<NarrativeEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM narrative_events
             WHERE node_id = $1
             ORDER BY occurred_at ASC, created_at ASC, id ASC"
        );
        sqlx::query_as::<_, NarrativeEvent>(&query)
            .bind(node_id)
            .fetch_all(pool)
            .await
    }

    /// Update an event. Only non-`None` fields in `input` are applied;
    /// `clear_description` resets the description to NULL.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateEvent,
    ) -> Result<Option<NarrativeEvent>, StoreError> {
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }
        if input.clear_description && input.description.is_some() {
            return Err(StoreError::Core(CoreError::Validation(
                "description and clear_description are mutually exclusive".to_string(),
            )));
        }
        let query = format!(
            "UPDATE narrative_events SET
                speaker = COALESCE($2, speaker),
                content = COALESCE($3, content),
                description = CASE WHEN $8 THEN NULL ELSE COALESCE($4, description) END,
                occurred_at = COALESCE($5, occurred_at),
                event_type = COALESCE($6, event_type),
                metadata = COALESCE($7, metadata),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let event = sqlx::query_as::<_, NarrativeEvent>(&query)
            .bind(id)
            .bind(&input.speaker)
            .bind(&input.content)
            .bind(&input.description)
            .bind(input.occurred_at)
            .bind(input.event_type.map(EventType::as_str))
            .bind(&input.metadata)
            .bind(input.clear_description)
            .fetch_optional(pool)
            .await?;
        Ok(event)
    }

    /// Delete an event, the bindings that target it, and the templates only
    /// those bindings used. Sub-actions owned by the event go by cascade.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let released: Vec<(DbId,)> = sqlx::query_as(
            "DELETE FROM action_bindings WHERE target_event_id = $1 RETURNING action_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let released: Vec<DbId> = released.into_iter().map(|(a,)| a).collect();
        delete_unused_templates(&mut tx, &released).await?;

        let result = sqlx::query("DELETE FROM narrative_events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(event_id = %id, bindings = released.len(), "Event deleted");
        }
        Ok(deleted)
    }
}
