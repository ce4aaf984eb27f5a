//! Action (choice template) models and DTOs.

use plotweave_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `actions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Action {
    pub id: DbId,
    pub project_id: DbId,
    /// Set when the action is a sub-choice owned by an event.
    pub event_id: Option<DbId>,
    pub description: String,
    pub is_key_action: bool,
    /// Navigation kind, response text, effect description.
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAction {
    pub description: String,
    #[serde(default)]
    pub is_key_action: bool,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAction {
    pub description: Option<String>,
    pub is_key_action: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}
