//! History ledger models and DTOs.

use plotweave_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A full row from `story_edit_history`, document included.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HistoryEntry {
    pub id: DbId,
    pub project_id: DbId,
    pub user_id: DbId,
    pub operation_type: String,
    pub operation_description: Option<String>,
    pub affected_node_id: Option<DbId>,
    pub snapshot_data: serde_json::Value,
    pub created_at: Timestamp,
}

/// Ledger listing row without the embedded document.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HistorySummary {
    pub id: DbId,
    pub project_id: DbId,
    pub user_id: DbId,
    pub operation_type: String,
    pub operation_description: Option<String>,
    pub affected_node_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl From<HistoryEntry> for HistorySummary {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            project_id: entry.project_id,
            user_id: entry.user_id,
            operation_type: entry.operation_type,
            operation_description: entry.operation_description,
            affected_node_id: entry.affected_node_id,
            created_at: entry.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSnapshot {
    pub operation_type: String,
    pub operation_description: Option<String>,
    pub affected_node_id: Option<DbId>,
}
