//! Repository for the `narrative_projects` table.

use plotweave_core::story::{validate_metadata, validate_title};
use plotweave_core::types::{new_id, DbId};
use sqlx::{PgConnection, PgPool};

use crate::error::StoreError;
use crate::models::project::{CreateProject, NarrativeProject, UpdateProject};

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, owner_id, title, description, world_setting, style, \
    start_node_id, metadata, created_at, updated_at";

/// Provides CRUD operations for story projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project owned by `owner_id`.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateProject,
    ) -> Result<NarrativeProject, StoreError> {
        validate_title(&input.title)?;
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }
        let query = format!(
            "INSERT INTO narrative_projects
                (id, owner_id, title, description, world_setting, style, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, '{{}}'::jsonb))
             RETURNING {COLUMNS}"
        );
        let project = sqlx::query_as::<_, NarrativeProject>(&query)
            .bind(new_id())
            .bind(owner_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.world_setting)
            .bind(&input.style)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await?;
        tracing::info!(project_id = %project.id, owner_id = %owner_id, "Project created");
        Ok(project)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NarrativeProject>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM narrative_projects WHERE id = $1");
        sqlx::query_as::<_, NarrativeProject>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's projects, most recently updated first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<NarrativeProject>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM narrative_projects
             WHERE owner_id = $1
             ORDER BY updated_at DESC, id DESC"
        );
        sqlx::query_as::<_, NarrativeProject>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Update a project. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProject,
    ) -> Result<Option<NarrativeProject>, StoreError> {
        if let Some(title) = &input.title {
            validate_title(title)?;
        }
        if let Some(metadata) = &input.metadata {
            validate_metadata(metadata)?;
        }
        let query = format!(
            "UPDATE narrative_projects SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                world_setting = COALESCE($4, world_setting),
                style = COALESCE($5, style),
                metadata = COALESCE($6, metadata),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let project = sqlx::query_as::<_, NarrativeProject>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.world_setting)
            .bind(&input.style)
            .bind(&input.metadata)
            .fetch_optional(pool)
            .await?;
        Ok(project)
    }

    /// Point the project at a start node, or clear it with `None`.
    ///
    /// The node must belong to the project.
    pub async fn set_start_node(
        pool: &PgPool,
        id: DbId,
        node_id: Option<DbId>,
    ) -> Result<NarrativeProject, StoreError> {
        let mut tx = pool.begin().await?;
        Self::lock(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("project", id))?;

        if let Some(node_id) = node_id {
            let owner: Option<(DbId,)> =
                sqlx::query_as("SELECT project_id FROM narrative_nodes WHERE id = $1")
                    .bind(node_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match owner {
                None => return Err(StoreError::not_found("node", node_id)),
                Some((project_id,)) if project_id != id => {
                    return Err(StoreError::constraint(format!(
                        "Node {node_id} does not belong to project {id}"
                    )))
                }
                Some(_) => {}
            }
        }

        let query = format!(
            "UPDATE narrative_projects SET start_node_id = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let project = sqlx::query_as::<_, NarrativeProject>(&query)
            .bind(id)
            .bind(node_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(project_id = %id, start_node_id = ?node_id, "Start node set");
        Ok(project)
    }

    /// Delete a project and, by cascade, everything it owns.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM narrative_projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Take the per-project structural lock for the rest of the transaction.
    ///
    /// Structural edits (node create/delete, branching, snapshot capture,
    /// rollback) all go through here so they serialize per project.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<NarrativeProject>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM narrative_projects WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, NarrativeProject>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }
}
