//! Repository for the `narrative_nodes` table.

use plotweave_core::error::CoreError;
use plotweave_core::story::{
    validate_action_description, validate_level, validate_metadata, validate_scene, NodeType,
};
use plotweave_core::types::{new_id, DbId};
use sqlx::{PgConnection, PgPool};

use crate::error::StoreError;
use crate::models::node::{CreateNode, NarrativeNode, NewBranch, UpdateNode};
use crate::repositories::ProjectRepo;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, project_id, scene, node_type, level, parent_node_id, \
    metadata, created_at, updated_at";

/// Provides CRUD and branching operations for story nodes.
pub struct NodeRepo;

impl NodeRepo {
    /// Insert a node. The first node of a project without a start node
    /// becomes its start node.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateNode,
    ) -> Result<NarrativeNode, StoreError> {
        validate_scene(&input.scene)?;
        if let Some(level) = input.level {
            validate_level(level)?;
        }
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }

        let mut tx = pool.begin().await?;
        let project = ProjectRepo::lock(&mut tx, project_id)
            .await?
            .ok_or_else(|| StoreError::not_found("project", project_id))?;
        if let Some(parent_id) = input.parent_node_id {
            ensure_node_in_project(&mut tx, parent_id, project_id).await?;
        }

        let node = insert_node(
            &mut tx,
            project_id,
            &input.scene,
            input.node_type.unwrap_or_default(),
            input.level.unwrap_or(0),
            input.parent_node_id,
            input.metadata.as_ref(),
        )
        .await?;

        if project.start_node_id.is_none() {
            sqlx::query(
                "UPDATE narrative_projects SET start_node_id = $2, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(project_id)
            .bind(node.id)
            .execute(&mut *tx)
            .await?;
            tracing::info!(project_id = %project_id, node_id = %node.id, "Start node assigned");
        }

        tx.commit().await?;
        tracing::info!(project_id = %project_id, node_id = %node.id, "Node created");
        Ok(node)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<NarrativeNode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM narrative_nodes WHERE id = $1");
        sqlx::query_as::<_, NarrativeNode>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's nodes in creation order.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<NarrativeNode>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM narrative_nodes
             WHERE project_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, NarrativeNode>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Update a node. Only non-`None` fields in `input` are applied;
    /// `clear_parent` detaches it from its parent.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateNode,
    ) -> Result<Option<NarrativeNode>, StoreError> {
        if let Some(scene) = &input.scene {
            validate_scene(scene)?;
        }
        if let Some(level) = input.level {
            validate_level(level)?;
        }
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }
        if input.clear_parent && input.parent_node_id.is_some() {
            return Err(StoreError::Core(CoreError::Validation(
                "parent_node_id and clear_parent are mutually exclusive".to_string(),
            )));
        }
        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        if let Some(parent_id) = input.parent_node_id {
            if parent_id == id {
                return Err(StoreError::constraint("A node cannot be its own parent"));
            }
            let mut conn = pool.acquire().await?;
            ensure_node_in_project(&mut conn, parent_id, current.project_id).await?;
        }

        let query = format!(
            "UPDATE narrative_nodes SET
                scene = COALESCE($2, scene),
                node_type = COALESCE($3, node_type),
                level = COALESCE($4, level),
                parent_node_id = CASE WHEN $7 THEN NULL ELSE COALESCE($5, parent_node_id) END,
                metadata = COALESCE($6, metadata),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let node = sqlx::query_as::<_, NarrativeNode>(&query)
            .bind(id)
            .bind(&input.scene)
            .bind(input.node_type.map(NodeType::as_str))
            .bind(input.level)
            .bind(input.parent_node_id)
            .bind(&input.metadata)
            .bind(input.clear_parent)
            .fetch_optional(pool)
            .await?;
        if node.is_some() {
            tracing::info!(node_id = %id, "Node updated");
        }
        Ok(node)
    }

    /// Delete a node along with everything that would otherwise dangle.
    ///
    /// In one transaction under the project lock: clear the start node if it
    /// points here, drop bindings into and out of the node (and into its
    /// events), drop the template actions only those bindings used, then
    /// delete the node. Events and event-owned actions follow by cascade;
    /// children keep existing with `parent_node_id = NULL`.
    ///
    /// Returns `false` if the node did not exist.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project_id: Option<(DbId,)> =
            sqlx::query_as("SELECT project_id FROM narrative_nodes WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((project_id,)) = project_id else {
            return Ok(false);
        };
        ProjectRepo::lock(&mut tx, project_id).await?;

        sqlx::query(
            "UPDATE narrative_projects SET start_node_id = NULL, updated_at = NOW()
             WHERE id = $1 AND start_node_id = $2",
        )
        .bind(project_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let released: Vec<(DbId,)> = sqlx::query_as(
            "DELETE FROM action_bindings
             WHERE source_node_id = $1
                OR target_node_id = $1
                OR target_event_id IN (SELECT id FROM narrative_events WHERE node_id = $1)
             RETURNING action_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let released: Vec<DbId> = released.into_iter().map(|(a,)| a).collect();
        let dropped_actions = delete_unused_templates(&mut tx, &released).await?;

        let result = sqlx::query("DELETE FROM narrative_nodes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project_id,
            node_id = %id,
            bindings = released.len(),
            actions = dropped_actions,
            "Node deleted",
        );
        Ok(result.rows_affected() > 0)
    }

    /// Create one child scene per choice, each reached from `from_node_id`
    /// by a new key action, all in one transaction.
    pub async fn add_branch(
        pool: &PgPool,
        from_node_id: DbId,
        choices: &[NewBranch],
    ) -> Result<Vec<NarrativeNode>, StoreError> {
        if choices.is_empty() {
            return Err(CoreError::Validation("At least one choice is required".to_string()).into());
        }
        for choice in choices {
            validate_scene(&choice.scene)?;
            validate_action_description(&choice.action_description)?;
        }

        let from = Self::find_by_id(pool, from_node_id)
            .await?
            .ok_or_else(|| StoreError::not_found("node", from_node_id))?;
        let level = from.level + 1;
        validate_level(level)?;

        let mut tx = pool.begin().await?;
        ProjectRepo::lock(&mut tx, from.project_id)
            .await?
            .ok_or_else(|| StoreError::not_found("project", from.project_id))?;

        let mut created = Vec::with_capacity(choices.len());
        for choice in choices {
            let node = insert_node(
                &mut tx,
                from.project_id,
                &choice.scene,
                NodeType::Scene,
                level,
                Some(from.id),
                None,
            )
            .await?;

            let action_id = new_id();
            sqlx::query(
                "INSERT INTO actions (id, project_id, description, is_key_action)
                 VALUES ($1, $2, $3, true)",
            )
            .bind(action_id)
            .bind(from.project_id)
            .bind(&choice.action_description)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO action_bindings (id, action_id, source_node_id, target_node_id)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(new_id())
            .bind(action_id)
            .bind(from.id)
            .bind(node.id)
            .execute(&mut *tx)
            .await?;

            created.push(node);
        }
        tx.commit().await?;

        tracing::info!(
            project_id = %from.project_id,
            from_node_id = %from.id,
            count = created.len(),
            "Branches added",
        );
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_node(
    conn: &mut PgConnection,
    project_id: DbId,
    scene: &str,
    node_type: NodeType,
    level: i32,
    parent_node_id: Option<DbId>,
    metadata: Option<&serde_json::Value>,
) -> Result<NarrativeNode, sqlx::Error> {
    let query = format!(
        "INSERT INTO narrative_nodes
            (id, project_id, scene, node_type, level, parent_node_id, metadata)
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, '{{}}'::jsonb))
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, NarrativeNode>(&query)
        .bind(new_id())
        .bind(project_id)
        .bind(scene)
        .bind(node_type.as_str())
        .bind(level)
        .bind(parent_node_id)
        .bind(metadata)
        .fetch_one(conn)
        .await
}

/// Fail unless `node_id` exists and belongs to `project_id`.
pub(crate) async fn ensure_node_in_project(
    conn: &mut PgConnection,
    node_id: DbId,
    project_id: DbId,
) -> Result<(), StoreError> {
    let owner: Option<(DbId,)> =
        sqlx::query_as("SELECT project_id FROM narrative_nodes WHERE id = $1")
            .bind(node_id)
            .fetch_optional(conn)
            .await?;
    match owner {
        None => Err(StoreError::not_found("node", node_id)),
        Some((owner,)) if owner != project_id => Err(StoreError::constraint(format!(
            "Node {node_id} belongs to a different project"
        ))),
        Some(_) => Ok(()),
    }
}

/// Delete those of `action_ids` that are now unbound templates (no owning
/// event, no remaining binding). Returns how many were removed.
pub(crate) async fn delete_unused_templates(
    conn: &mut PgConnection,
    action_ids: &[DbId],
) -> Result<u64, sqlx::Error> {
    if action_ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "DELETE FROM actions a
         WHERE a.id = ANY($1)
           AND a.event_id IS NULL
           AND NOT EXISTS (SELECT 1 FROM action_bindings b WHERE b.action_id = a.id)",
    )
    .bind(action_ids)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
