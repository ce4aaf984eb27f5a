//! Narrative event models and DTOs.

use plotweave_core::story::EventType;
use plotweave_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `narrative_events` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NarrativeEvent {
    pub id: DbId,
    pub node_id: DbId,
    /// Empty for narration.
    pub speaker: String,
    pub content: String,
    pub description: Option<String>,
    pub occurred_at: Timestamp,
    pub event_type: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    pub speaker: Option<String>,
    pub content: String,
    pub description: Option<String>,
    /// Defaults to the insertion time.
    pub occurred_at: Option<Timestamp>,
    pub event_type: Option<EventType>,
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvent {
    pub speaker: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub occurred_at: Option<Timestamp>,
    pub event_type: Option<EventType>,
    pub metadata: Option<serde_json::Value>,
    /// Remove the description. Cannot be combined with `description`.
    #[serde(default)]
    pub clear_description: bool,
}
