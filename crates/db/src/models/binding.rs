//! Action binding models and DTOs.

use plotweave_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `action_bindings` table.
///
/// Exactly one of `target_node_id` / `target_event_id` is set.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActionBinding {
    pub id: DbId,
    pub action_id: DbId,
    pub source_node_id: DbId,
    pub target_node_id: Option<DbId>,
    pub target_event_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A binding joined with the action it realizes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BindingWithAction {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub binding: ActionBinding,
    pub action_description: String,
    pub is_key_action: bool,
    pub action_metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateActionBinding {
    pub action_id: DbId,
    pub target_node_id: Option<DbId>,
    pub target_event_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Retarget or rebind. Supplying either target replaces the whole target
/// pair; omitting both keeps the current one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateActionBinding {
    pub action_id: Option<DbId>,
    pub target_node_id: Option<DbId>,
    pub target_event_id: Option<DbId>,
}
