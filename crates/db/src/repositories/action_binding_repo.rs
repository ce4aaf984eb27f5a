//! Repository for the `action_bindings` table.
//!
//! Every write goes through [`validate_binding`], so an illegal binding
//! shape never reaches the database.

use plotweave_core::binding::{validate_binding, BindingTarget};
use plotweave_core::types::{new_id, DbId};
use sqlx::{PgConnection, PgPool};

use crate::error::StoreError;
use crate::models::binding::{
    ActionBinding, BindingWithAction, CreateActionBinding, UpdateActionBinding,
};
use crate::repositories::node_repo::ensure_node_in_project;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, action_id, source_node_id, target_node_id, \
    target_event_id, created_at, updated_at";

/// Provides validated CRUD operations for action bindings.
pub struct ActionBindingRepo;

impl ActionBindingRepo {
    /// Bind an action from `source_node_id` to a node or event target.
    pub async fn create(
        pool: &PgPool,
        source_node_id: DbId,
        input: &CreateActionBinding,
    ) -> Result<ActionBinding, StoreError> {
        let mut tx = pool.begin().await?;
        let project_id = node_project(&mut tx, source_node_id).await?;
        let target = check_binding(
            &mut tx,
            project_id,
            input.action_id,
            input.target_node_id,
            input.target_event_id,
        )
        .await?;
        let (target_node_id, target_event_id) = target.columns();

        let query = format!(
            "INSERT INTO action_bindings
                (id, action_id, source_node_id, target_node_id, target_event_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let binding = sqlx::query_as::<_, ActionBinding>(&query)
            .bind(new_id())
            .bind(input.action_id)
            .bind(source_node_id)
            .bind(target_node_id)
            .bind(target_event_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            binding_id = %binding.id,
            source_node_id = %source_node_id,
            key = target.is_key(),
            "Action binding created",
        );
        Ok(binding)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ActionBinding>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM action_bindings WHERE id = $1");
        sqlx::query_as::<_, ActionBinding>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Outgoing bindings of a node, each with its action's fields.
    pub async fn list_by_source_node(
        pool: &PgPool,
        source_node_id: DbId,
    ) -> Result<Vec<BindingWithAction>, sqlx::Error> {
        sqlx::query_as::<_, BindingWithAction>(
            "SELECT b.id, b.action_id, b.source_node_id, b.target_node_id, b.target_event_id,
                    b.created_at, b.updated_at,
                    a.description AS action_description,
                    a.is_key_action,
                    a.metadata AS action_metadata
             FROM action_bindings b
             JOIN actions a ON a.id = b.action_id
             WHERE b.source_node_id = $1
             ORDER BY b.created_at ASC, b.id ASC",
        )
        .bind(source_node_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_action(
        pool: &PgPool,
        action_id: DbId,
    ) -> Result<Vec<ActionBinding>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM action_bindings WHERE action_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, ActionBinding>(&query)
            .bind(action_id)
            .fetch_all(pool)
            .await
    }

    /// Rebind or retarget a binding; the merged result is validated as a
    /// whole. Returns `None` if the binding does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateActionBinding,
    ) -> Result<Option<ActionBinding>, StoreError> {
        let mut tx = pool.begin().await?;
        let query = format!("SELECT {COLUMNS} FROM action_bindings WHERE id = $1 FOR UPDATE");
        let Some(current) = sqlx::query_as::<_, ActionBinding>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let project_id = node_project(&mut tx, current.source_node_id).await?;
        let action_id = input.action_id.unwrap_or(current.action_id);
        let (node, event) = if input.target_node_id.is_some() || input.target_event_id.is_some() {
            (input.target_node_id, input.target_event_id)
        } else {
            (current.target_node_id, current.target_event_id)
        };
        let target = check_binding(&mut tx, project_id, action_id, node, event).await?;
        let (target_node_id, target_event_id) = target.columns();

        let query = format!(
            "UPDATE action_bindings SET
                action_id = $2,
                target_node_id = $3,
                target_event_id = $4,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let binding = sqlx::query_as::<_, ActionBinding>(&query)
            .bind(id)
            .bind(action_id)
            .bind(target_node_id)
            .bind(target_event_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(binding_id = %id, "Action binding updated");
        Ok(Some(binding))
    }

    /// Delete only the binding; its action stays behind as a template.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM action_bindings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn node_project(conn: &mut PgConnection, node_id: DbId) -> Result<DbId, StoreError> {
    let row: Option<(DbId,)> =
        sqlx::query_as("SELECT project_id FROM narrative_nodes WHERE id = $1")
            .bind(node_id)
            .fetch_optional(conn)
            .await?;
    row.map(|(p,)| p)
        .ok_or_else(|| StoreError::not_found("node", node_id))
}

/// Resolve the action, validate the shape against its key flag, and make
/// sure the action and target live in `project_id`.
///
/// The action row stays share-locked until the caller commits, so a
/// concurrent key-flag flip in [`ActionRepo::update`](crate::repositories::ActionRepo::update)
/// waits and then sees the new binding.
async fn check_binding(
    conn: &mut PgConnection,
    project_id: DbId,
    action_id: DbId,
    target_node_id: Option<DbId>,
    target_event_id: Option<DbId>,
) -> Result<BindingTarget, StoreError> {
    let action: Option<(DbId, bool)> = sqlx::query_as(
        "SELECT project_id, is_key_action FROM actions WHERE id = $1 FOR SHARE",
    )
    .bind(action_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some((action_project, is_key_action)) = action else {
        return Err(StoreError::not_found("action", action_id));
    };
    if action_project != project_id {
        return Err(StoreError::constraint(format!(
            "Action {action_id} belongs to a different project"
        )));
    }

    let target = validate_binding(is_key_action, target_node_id, target_event_id)?;
    match target {
        BindingTarget::Node(node_id) => {
            ensure_node_in_project(conn, node_id, project_id).await?;
        }
        BindingTarget::Event(event_id) => {
            let owner: Option<(DbId,)> = sqlx::query_as(
                "SELECT n.project_id FROM narrative_events e
                 JOIN narrative_nodes n ON n.id = e.node_id
                 WHERE e.id = $1",
            )
            .bind(event_id)
            .fetch_optional(&mut *conn)
            .await?;
            match owner {
                None => return Err(StoreError::not_found("event", event_id)),
                Some((owner,)) if owner != project_id => {
                    return Err(StoreError::constraint(format!(
                        "Event {event_id} belongs to a different project"
                    )))
                }
                Some(_) => {}
            }
        }
    }
    Ok(target)
}
