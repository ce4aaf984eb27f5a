//! Story project models and DTOs.

use plotweave_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `narrative_projects` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NarrativeProject {
    pub id: DbId,
    pub owner_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub world_setting: Option<String>,
    pub style: Option<String>,
    pub start_node_id: Option<DbId>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: String,
    pub description: Option<String>,
    pub world_setting: Option<String>,
    pub style: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Partial update. The start node is changed through
/// `ProjectRepo::set_start_node`, which validates it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub world_setting: Option<String>,
    pub style: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
