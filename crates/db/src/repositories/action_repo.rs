//! Repository for the `actions` table.

use plotweave_core::binding::{validate_binding, validate_event_action};
use plotweave_core::story::{validate_action_description, validate_metadata};
use plotweave_core::types::{new_id, DbId};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::action::{Action, CreateAction, UpdateAction};

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str =
    "id, project_id, event_id, description, is_key_action, metadata, created_at, updated_at";

/// Provides CRUD operations for actions.
pub struct ActionRepo;

impl ActionRepo {
    /// Create a standalone action template for later binding.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateAction,
    ) -> Result<Action, StoreError> {
        validate_input(input)?;
        let exists: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM narrative_projects WHERE id = $1")
                .bind(project_id)
                .fetch_optional(pool)
                .await?;
        if exists.is_none() {
            return Err(StoreError::not_found("project", project_id));
        }
        let action = insert(pool, project_id, None, input).await?;
        tracing::info!(project_id = %project_id, action_id = %action.id, "Action created");
        Ok(action)
    }

    /// Create a regular sub-choice owned by an event.
    pub async fn create_for_event(
        pool: &PgPool,
        event_id: DbId,
        input: &CreateAction,
    ) -> Result<Action, StoreError> {
        validate_input(input)?;
        validate_event_action(input.is_key_action)?;
        let project: Option<(DbId,)> = sqlx::query_as(
            "SELECT n.project_id FROM narrative_events e
             JOIN narrative_nodes n ON n.id = e.node_id
             WHERE e.id = $1",
        )
        .bind(event_id)
        .fetch_optional(pool)
        .await?;
        let Some((project_id,)) = project else {
            return Err(StoreError::not_found("event", event_id));
        };
        let action = insert(pool, project_id, Some(event_id), input).await?;
        tracing::info!(event_id = %event_id, action_id = %action.id, "Event action created");
        Ok(action)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Action>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM actions WHERE id = $1");
        sqlx::query_as::<_, Action>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_project(pool: &PgPool, project_id: DbId) -> Result<Vec<Action>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM actions WHERE project_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Action>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_event(pool: &PgPool, event_id: DbId) -> Result<Vec<Action>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM actions WHERE event_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Action>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Update an action. Flipping `is_key_action` is rejected if any existing
    /// binding, or an owning event, would become illegal.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateAction,
    ) -> Result<Option<Action>, StoreError> {
        if let Some(description) = &input.description {
            validate_action_description(description)?;
        }
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }

        let mut tx = pool.begin().await?;
        let query = format!("SELECT {COLUMNS} FROM actions WHERE id = $1 FOR UPDATE");
        let Some(current) = sqlx::query_as::<_, Action>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if let Some(is_key) = input.is_key_action.filter(|k| *k != current.is_key_action) {
            if current.event_id.is_some() {
                validate_event_action(is_key)?;
            }
            let targets: Vec<(Option<DbId>, Option<DbId>)> = sqlx::query_as(
                "SELECT target_node_id, target_event_id FROM action_bindings WHERE action_id = $1",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
            for (node, event) in targets {
                validate_binding(is_key, node, event)?;
            }
        }

        let query = format!(
            "UPDATE actions SET
                description = COALESCE($2, description),
                is_key_action = COALESCE($3, is_key_action),
                metadata = COALESCE($4, metadata),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let action = sqlx::query_as::<_, Action>(&query)
            .bind(id)
            .bind(&input.description)
            .bind(input.is_key_action)
            .bind(&input.metadata)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(action))
    }

    /// Delete an action after removing the bindings that realize it.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let bindings = sqlx::query("DELETE FROM action_bindings WHERE action_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM actions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(action_id = %id, bindings = bindings.rows_affected(), "Action deleted");
        }
        Ok(deleted)
    }
}

fn validate_input(input: &CreateAction) -> Result<(), StoreError> {
    validate_action_description(&input.description)?;
    if let Some(metadata) = &input.metadata {
        validate_metadata(metadata)?;
    }
    Ok(())
}

async fn insert(
    pool: &PgPool,
    project_id: DbId,
    event_id: Option<DbId>,
    input: &CreateAction,
) -> Result<Action, sqlx::Error> {
    let query = format!(
        "INSERT INTO actions (id, project_id, event_id, description, is_key_action, metadata)
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, '{{}}'::jsonb))
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Action>(&query)
        .bind(new_id())
        .bind(project_id)
        .bind(event_id)
        .bind(&input.description)
        .bind(input.is_key_action)
        .bind(&input.metadata)
        .fetch_one(pool)
        .await
}
