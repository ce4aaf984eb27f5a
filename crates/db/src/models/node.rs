//! Story node models and DTOs.

use plotweave_core::story::NodeType;
use plotweave_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `narrative_nodes` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NarrativeNode {
    pub id: DbId,
    pub project_id: DbId,
    pub scene: String,
    pub node_type: String,
    pub level: i32,
    pub parent_node_id: Option<DbId>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNode {
    pub scene: String,
    pub node_type: Option<NodeType>,
    pub level: Option<i32>,
    pub parent_node_id: Option<DbId>,
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNode {
    pub scene: Option<String>,
    pub node_type: Option<NodeType>,
    pub level: Option<i32>,
    pub parent_node_id: Option<DbId>,
    pub metadata: Option<serde_json::Value>,
    /// Detach the node from its parent. Cannot be combined with `parent_node_id`.
    #[serde(default)]
    pub clear_parent: bool,
}

// ---------------------------------------------------------------------------
// Branching
// ---------------------------------------------------------------------------

/// One choice of an `add_branch` request: a key action leading to a new scene.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBranch {
    pub action_description: String,
    pub scene: String,
}
