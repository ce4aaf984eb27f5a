//! Loads a project's rows into the core snapshot builder and graph arena.
//!
//! Capture is a pure read: it takes a connection (pool-acquired or inside a
//! caller's transaction) and a project id, and returns a document plus the
//! warnings for anything that had to be left out.

use plotweave_core::graph::{GraphEdge, StoryGraph};
use plotweave_core::snapshot::{
    ProjectState, RawAction, RawBinding, RawEvent, RawNode, SnapshotBuilder, SnapshotDocument,
    SnapshotWarning,
};
use plotweave_core::types::{DbId, Timestamp};
use sqlx::{FromRow, PgConnection, PgPool};

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

#[derive(FromRow)]
struct ProjectRow {
    title: String,
    description: Option<String>,
    start_node_id: Option<DbId>,
}

#[derive(FromRow)]
struct NodeRow {
    id: DbId,
    scene: String,
    node_type: String,
    level: i32,
    parent_node_id: Option<DbId>,
    metadata: serde_json::Value,
}

#[derive(FromRow)]
struct EventRow {
    id: DbId,
    node_id: DbId,
    speaker: String,
    content: String,
    description: Option<String>,
    occurred_at: Timestamp,
    event_type: String,
    metadata: serde_json::Value,
}

#[derive(FromRow)]
struct EventActionRow {
    event_id: DbId,
    id: DbId,
    description: String,
    is_key_action: bool,
    metadata: serde_json::Value,
}

#[derive(FromRow)]
struct BindingRow {
    id: DbId,
    source_node_id: DbId,
    target_node_id: Option<DbId>,
    target_event_id: Option<DbId>,
    action_id: DbId,
    action_description: String,
    is_key_action: bool,
    action_metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const NODES_SQL: &str = "SELECT id, scene, node_type, level, parent_node_id, metadata
    FROM narrative_nodes
    WHERE project_id = $1
    ORDER BY created_at ASC, id ASC";

const EVENTS_SQL: &str = "SELECT e.id, e.node_id, e.speaker, e.content, e.description,
        e.occurred_at, e.event_type, e.metadata
    FROM narrative_events e
    JOIN narrative_nodes n ON n.id = e.node_id
    WHERE n.project_id = $1
    ORDER BY e.occurred_at ASC, e.created_at ASC, e.id ASC";

const EVENT_ACTIONS_SQL: &str = "SELECT a.event_id, a.id, a.description, a.is_key_action, a.metadata
    FROM actions a
    JOIN narrative_events e ON e.id = a.event_id
    JOIN narrative_nodes n ON n.id = e.node_id
    WHERE n.project_id = $1
    ORDER BY a.created_at ASC, a.id ASC";

const BINDINGS_SQL: &str = "SELECT b.id, b.source_node_id, b.target_node_id, b.target_event_id,
        a.id AS action_id, a.description AS action_description, a.is_key_action,
        a.metadata AS action_metadata
    FROM action_bindings b
    JOIN actions a ON a.id = b.action_id
    JOIN narrative_nodes n ON n.id = b.source_node_id
    WHERE n.project_id = $1
    ORDER BY b.created_at ASC, b.id ASC";

/// Reads whole-project structure for snapshots and graph analysis.
pub struct StoryGraphRepo;

impl StoryGraphRepo {
    /// Serialize the project's current state into a snapshot document.
    ///
    /// Returns `None` if the project does not exist.
    pub async fn capture(
        conn: &mut PgConnection,
        project_id: DbId,
    ) -> Result<Option<(SnapshotDocument, Vec<SnapshotWarning>)>, sqlx::Error> {
        let project: Option<ProjectRow> = sqlx::query_as(
            "SELECT title, description, start_node_id FROM narrative_projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(project) = project else {
            return Ok(None);
        };

        let nodes: Vec<NodeRow> = sqlx::query_as(NODES_SQL)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await?;
        let events: Vec<EventRow> = sqlx::query_as(EVENTS_SQL)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await?;
        let event_actions: Vec<EventActionRow> = sqlx::query_as(EVENT_ACTIONS_SQL)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await?;
        let bindings: Vec<BindingRow> = sqlx::query_as(BINDINGS_SQL)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut builder = SnapshotBuilder::new(
            project_id,
            ProjectState {
                title: project.title,
                description: project.description,
                start_node_id: project.start_node_id,
            },
        );
        for n in nodes {
            builder.add_node(RawNode {
                id: n.id,
                scene: n.scene,
                node_type: n.node_type,
                level: n.level,
                parent_node_id: n.parent_node_id,
                metadata: n.metadata,
            });
        }
        for e in events {
            builder.add_event(RawEvent {
                id: e.id,
                node_id: e.node_id,
                speaker: e.speaker,
                content: e.content,
                description: e.description,
                occurred_at: e.occurred_at,
                event_type: e.event_type,
                metadata: e.metadata,
            });
        }
        for a in event_actions {
            builder.add_event_action(
                a.event_id,
                RawAction {
                    id: a.id,
                    description: a.description,
                    is_key_action: a.is_key_action,
                    metadata: a.metadata,
                },
            );
        }
        for b in bindings {
            builder.add_binding(RawBinding {
                id: b.id,
                source_node_id: b.source_node_id,
                target_node_id: b.target_node_id,
                target_event_id: b.target_event_id,
                action: RawAction {
                    id: b.action_id,
                    description: b.action_description,
                    is_key_action: b.is_key_action,
                    metadata: b.action_metadata,
                },
            });
        }

        let (document, warnings) = builder.finish();
        tracing::debug!(
            project_id = %project_id,
            nodes = document.nodes.len(),
            warnings = warnings.len(),
            "Project captured",
        );
        Ok(Some((document, warnings)))
    }

    /// [`Self::capture`] on a pooled connection.
    pub async fn load_document(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Option<(SnapshotDocument, Vec<SnapshotWarning>)>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::capture(&mut conn, project_id).await
    }

    /// Build the graph arena for reachability and validation queries.
    ///
    /// Unlike a snapshot this includes unbound template actions so the
    /// orphan category can be reported. Returns `None` if the project does
    /// not exist.
    pub async fn load_graph(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Option<StoryGraph>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        let start: Option<(Option<DbId>,)> =
            sqlx::query_as("SELECT start_node_id FROM narrative_projects WHERE id = $1")
                .bind(project_id)
                .fetch_optional(&mut *conn)
                .await?;
        let Some((start_node_id,)) = start else {
            return Ok(None);
        };

        let nodes: Vec<(DbId,)> =
            sqlx::query_as("SELECT id FROM narrative_nodes WHERE project_id = $1")
                .bind(project_id)
                .fetch_all(&mut *conn)
                .await?;
        let events: Vec<(DbId, DbId)> = sqlx::query_as(
            "SELECT e.id, e.node_id FROM narrative_events e
             JOIN narrative_nodes n ON n.id = e.node_id
             WHERE n.project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
        let actions: Vec<(DbId, Option<DbId>)> =
            sqlx::query_as("SELECT id, event_id FROM actions WHERE project_id = $1")
                .bind(project_id)
                .fetch_all(&mut *conn)
                .await?;
        let bindings: Vec<BindingRow> = sqlx::query_as(BINDINGS_SQL)
            .bind(project_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut graph = StoryGraph::new(start_node_id);
        for (id,) in nodes {
            graph.add_node(id);
        }
        for (id, node_id) in events {
            graph.add_event(id, node_id);
        }
        for (id, event_id) in actions {
            graph.add_action(id, event_id);
        }
        for b in bindings {
            graph.add_edge(GraphEdge {
                binding_id: b.id,
                action_id: b.action_id,
                is_key_action: b.is_key_action,
                source_node_id: b.source_node_id,
                target_node_id: b.target_node_id,
                target_event_id: b.target_event_id,
            });
        }

        tracing::debug!(project_id = %project_id, nodes = graph.node_count(), "Graph loaded");
        Ok(Some(graph))
    }
}
