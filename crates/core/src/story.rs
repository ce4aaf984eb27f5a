//! Story entity kinds, field validation, and the project ownership predicate.
//!
//! Node and event kinds are persisted as lowercase text; the enums here are
//! the only place that knows the legal spellings.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed length for a project title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum allowed length for an action description.
pub const MAX_ACTION_DESCRIPTION_LENGTH: usize = 1000;

/// Maximum nesting level a node may declare.
pub const MAX_NODE_LEVEL: i32 = 1000;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// What a node represents in the storyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Main storyline scene.
    #[default]
    Scene,
    /// Independent event node.
    Event,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Scene => "scene",
            NodeType::Event => "event",
        }
    }

    /// Parse the persisted spelling.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "scene" => Ok(NodeType::Scene),
            "event" => Ok(NodeType::Event),
            other => Err(CoreError::Validation(format!(
                "Invalid node type '{other}'. Must be one of: scene, event"
            ))),
        }
    }
}

/// Presentation of an event's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    #[default]
    Dialogue,
    Narration,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Dialogue => "dialogue",
            EventType::Narration => "narration",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "dialogue" => Ok(EventType::Dialogue),
            "narration" => Ok(EventType::Narration),
            other => Err(CoreError::Validation(format!(
                "Invalid event type '{other}'. Must be one of: dialogue, narration"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a project title: non-blank and within [`MAX_TITLE_LENGTH`].
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Project title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Project title must not exceed {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Scenes may be short but never blank.
pub fn validate_scene(scene: &str) -> Result<(), CoreError> {
    if scene.trim().is_empty() {
        return Err(CoreError::Validation(
            "Node scene text must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate an action description: non-blank and within
/// [`MAX_ACTION_DESCRIPTION_LENGTH`].
pub fn validate_action_description(description: &str) -> Result<(), CoreError> {
    if description.trim().is_empty() {
        return Err(CoreError::Validation(
            "Action description must not be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_ACTION_DESCRIPTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Action description must not exceed {MAX_ACTION_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_level(level: i32) -> Result<(), CoreError> {
    if !(0..=MAX_NODE_LEVEL).contains(&level) {
        return Err(CoreError::Validation(format!(
            "Node level must be between 0 and {MAX_NODE_LEVEL}, got {level}"
        )));
    }
    Ok(())
}

/// Metadata blobs are free-form but must be JSON objects.
pub fn validate_metadata(metadata: &serde_json::Value) -> Result<(), CoreError> {
    if metadata.is_object() {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "metadata must be a JSON object".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// The ownership predicate: only the project owner may read or edit it.
pub fn ensure_project_owner(
    project_id: DbId,
    owner_id: DbId,
    user_id: DbId,
) -> Result<(), CoreError> {
    if owner_id == user_id {
        Ok(())
    } else {
        Err(CoreError::AccessDenied(format!(
            "User {user_id} does not own project {project_id}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
