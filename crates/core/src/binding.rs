//! Action binding shape rules.
//!
//! A binding connects a source node to exactly one target. Key actions land
//! on a node and move the story forward; regular actions land on an event and
//! leave the player where they are. [`BindingTarget`] encodes the two legal
//! shapes so that code past the validator never sees the other combinations.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// The resolved target of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BindingTarget {
    /// Key action: advances to another scene.
    Node(DbId),
    /// Regular action: triggers a flavor event.
    Event(DbId),
}

impl BindingTarget {
    pub fn is_key(&self) -> bool {
        matches!(self, BindingTarget::Node(_))
    }

    /// Split back into the `(target_node_id, target_event_id)` column pair.
    pub fn columns(&self) -> (Option<DbId>, Option<DbId>) {
        match *self {
            BindingTarget::Node(id) => (Some(id), None),
            BindingTarget::Event(id) => (None, Some(id)),
        }
    }

    pub fn node_id(&self) -> Option<DbId> {
        match *self {
            BindingTarget::Node(id) => Some(id),
            BindingTarget::Event(_) => None,
        }
    }

    pub fn event_id(&self) -> Option<DbId> {
        match *self {
            BindingTarget::Event(id) => Some(id),
            BindingTarget::Node(_) => None,
        }
    }
}

/// Check a binding's columns against the action's key flag.
///
/// Legal iff `is_key_action` with only a node target, or a regular action
/// with only an event target. Everything else is a `ConstraintViolation`.
pub fn validate_binding(
    is_key_action: bool,
    target_node_id: Option<DbId>,
    target_event_id: Option<DbId>,
) -> Result<BindingTarget, CoreError> {
    match (is_key_action, target_node_id, target_event_id) {
        (true, Some(node), None) => Ok(BindingTarget::Node(node)),
        (false, None, Some(event)) => Ok(BindingTarget::Event(event)),
        (_, Some(_), Some(_)) => Err(CoreError::ConstraintViolation(
            "A binding must target either a node or an event, not both".to_string(),
        )),
        (_, None, None) => Err(CoreError::ConstraintViolation(
            "A binding must have a target node or a target event".to_string(),
        )),
        (true, None, Some(_)) => Err(CoreError::ConstraintViolation(
            "Key actions must target a node, not an event".to_string(),
        )),
        (false, Some(_), None) => Err(CoreError::ConstraintViolation(
            "Regular actions must target an event, not a node".to_string(),
        )),
    }
}

/// Actions owned by an event are sub-choices and can never be key actions.
pub fn validate_event_action(is_key_action: bool) -> Result<(), CoreError> {
    if is_key_action {
        return Err(CoreError::ConstraintViolation(
            "Actions attached to an event must be regular (non-key) actions".to_string(),
        ));
    }
    Ok(())
}
