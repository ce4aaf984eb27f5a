//! The structural snapshot document and the builder that produces it.
//!
//! A document is a full closure of one project: project fields, every node
//! with its events (and their sub-actions) and its outgoing bindings, each
//! binding carrying a complete copy of its action. Nothing in a document
//! refers to a live action row, so restore never depends on other tables.
//!
//! The builder is fed raw rows in any order that respects ownership (nodes
//! before their events and bindings). A sub-entity that cannot be represented
//! is skipped, logged at `WARN`, and reported back as a [`SnapshotWarning`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binding::{validate_binding, BindingTarget};
use crate::error::CoreError;
use crate::story::{EventType, NodeType};
use crate::types::{DbId, Timestamp};

/// Version written into every new document.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub format_version: u32,
    pub project: ProjectState,
    pub nodes: Vec<NodeState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub title: String,
    pub description: Option<String>,
    pub start_node_id: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub id: DbId,
    pub scene: String,
    pub node_type: NodeType,
    pub level: i32,
    pub parent_node_id: Option<DbId>,
    pub metadata: serde_json::Value,
    pub events: Vec<EventState>,
    pub outgoing_bindings: Vec<BindingState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState {
    pub id: DbId,
    pub speaker: String,
    pub content: String,
    pub description: Option<String>,
    pub occurred_at: Timestamp,
    pub event_type: EventType,
    pub metadata: serde_json::Value,
    /// Regular sub-choices owned by this event.
    pub actions: Vec<ActionState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub id: DbId,
    pub description: String,
    pub is_key_action: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingState {
    pub id: DbId,
    pub action: ActionState,
    pub target: BindingTarget,
}

/// Entity totals of a document or of a restored project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructureCounts {
    pub nodes: usize,
    pub events: usize,
    pub actions: usize,
    pub bindings: usize,
}

impl SnapshotDocument {
    /// Decode a persisted document, refusing versions this build cannot restore.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let doc: SnapshotDocument = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Malformed snapshot document: {e}")))?;
        if doc.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(CoreError::Validation(format!(
                "Unsupported snapshot format version {} (expected {SNAPSHOT_FORMAT_VERSION})",
                doc.format_version
            )));
        }
        Ok(doc)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("Failed to encode snapshot document: {e}")))
    }

    pub fn counts(&self) -> StructureCounts {
        let mut counts = StructureCounts {
            nodes: self.nodes.len(),
            ..Default::default()
        };
        for node in &self.nodes {
            counts.events += node.events.len();
            counts.bindings += node.outgoing_bindings.len();
            counts.actions += node.outgoing_bindings.len();
            counts.actions += node.events.iter().map(|e| e.actions.len()).sum::<usize>();
        }
        counts
    }

    pub fn contains_node(&self, node_id: DbId) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }

    /// A copy with every action and binding id zeroed and bindings sorted.
    ///
    /// Restore issues fresh ids for actions and bindings, so two documents
    /// describing the same graph compare equal only in this form.
    pub fn structural_view(&self) -> SnapshotDocument {
        let mut doc = self.clone();
        doc.nodes.sort_by_key(|n| n.id);
        for node in &mut doc.nodes {
            for event in &mut node.events {
                for action in &mut event.actions {
                    action.id = DbId::nil();
                }
                event
                    .actions
                    .sort_by(|a, b| a.description.cmp(&b.description));
            }
            for binding in &mut node.outgoing_bindings {
                binding.id = DbId::nil();
                binding.action.id = DbId::nil();
            }
            node.outgoing_bindings.sort_by(|a, b| {
                (a.target.columns(), &a.action.description)
                    .cmp(&(b.target.columns(), &b.action.description))
            });
        }
        doc
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A sub-entity left out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotWarning {
    pub entity: &'static str,
    pub id: DbId,
    pub reason: String,
}

impl fmt::Display for SnapshotWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped {} {}: {}", self.entity, self.id, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Raw inputs
// ---------------------------------------------------------------------------

/// Node fields as they come out of storage, kinds still unparsed.
#[derive(Debug, Clone)]
pub struct RawNode {
    pub id: DbId,
    pub scene: String,
    pub node_type: String,
    pub level: i32,
    pub parent_node_id: Option<DbId>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: DbId,
    pub node_id: DbId,
    pub speaker: String,
    pub content: String,
    pub description: Option<String>,
    pub occurred_at: Timestamp,
    pub event_type: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct RawAction {
    pub id: DbId,
    pub description: String,
    pub is_key_action: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct RawBinding {
    pub id: DbId,
    pub source_node_id: DbId,
    pub target_node_id: Option<DbId>,
    pub target_event_id: Option<DbId>,
    pub action: RawAction,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates rows of one project into a [`SnapshotDocument`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    project_id: DbId,
    project: ProjectState,
    nodes: Vec<NodeState>,
    node_index: HashMap<DbId, usize>,
    /// event id -> (node position, event position)
    event_index: HashMap<DbId, (usize, usize)>,
    warnings: Vec<SnapshotWarning>,
}

impl SnapshotBuilder {
    pub fn new(project_id: DbId, project: ProjectState) -> Self {
        Self {
            project_id,
            project,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            event_index: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn skip(&mut self, entity: &'static str, id: DbId, reason: impl Into<String>) {
        let warning = SnapshotWarning {
            entity,
            id,
            reason: reason.into(),
        };
        tracing::warn!(
            project_id = %self.project_id,
            entity,
            entity_id = %id,
            reason = %warning.reason,
            "Snapshot sub-entity skipped",
        );
        self.warnings.push(warning);
    }

    pub fn add_node(&mut self, raw: RawNode) {
        let node_type = match NodeType::parse(&raw.node_type) {
            Ok(t) => t,
            Err(e) => return self.skip("node", raw.id, e.to_string()),
        };
        if !raw.metadata.is_object() {
            return self.skip("node", raw.id, "metadata is not a JSON object");
        }
        if self.node_index.contains_key(&raw.id) {
            return self.skip("node", raw.id, "duplicate node id");
        }
        self.node_index.insert(raw.id, self.nodes.len());
        self.nodes.push(NodeState {
            id: raw.id,
            scene: raw.scene,
            node_type,
            level: raw.level,
            parent_node_id: raw.parent_node_id,
            metadata: raw.metadata,
            events: Vec::new(),
            outgoing_bindings: Vec::new(),
        });
    }

    pub fn add_event(&mut self, raw: RawEvent) {
        let Some(&node_pos) = self.node_index.get(&raw.node_id) else {
            return self.skip("event", raw.id, "owning node is not part of the snapshot");
        };
        let event_type = match EventType::parse(&raw.event_type) {
            Ok(t) => t,
            Err(e) => return self.skip("event", raw.id, e.to_string()),
        };
        if !raw.metadata.is_object() {
            return self.skip("event", raw.id, "metadata is not a JSON object");
        }
        let events = &mut self.nodes[node_pos].events;
        self.event_index.insert(raw.id, (node_pos, events.len()));
        events.push(EventState {
            id: raw.id,
            speaker: raw.speaker,
            content: raw.content,
            description: raw.description,
            occurred_at: raw.occurred_at,
            event_type,
            metadata: raw.metadata,
            actions: Vec::new(),
        });
    }

    /// Attach a sub-choice to an already added event.
    pub fn add_event_action(&mut self, event_id: DbId, raw: RawAction) {
        let Some(&(node_pos, event_pos)) = self.event_index.get(&event_id) else {
            return self.skip("action", raw.id, "owning event is not part of the snapshot");
        };
        if raw.is_key_action {
            return self.skip("action", raw.id, "event-owned action is marked as key");
        }
        if !raw.metadata.is_object() {
            return self.skip("action", raw.id, "metadata is not a JSON object");
        }
        self.nodes[node_pos].events[event_pos]
            .actions
            .push(ActionState {
                id: raw.id,
                description: raw.description,
                is_key_action: raw.is_key_action,
                metadata: raw.metadata,
            });
    }

    pub fn add_binding(&mut self, raw: RawBinding) {
        let Some(&node_pos) = self.node_index.get(&raw.source_node_id) else {
            return self.skip("binding", raw.id, "source node is not part of the snapshot");
        };
        let target = match validate_binding(
            raw.action.is_key_action,
            raw.target_node_id,
            raw.target_event_id,
        ) {
            Ok(t) => t,
            Err(e) => return self.skip("binding", raw.id, e.to_string()),
        };
        if !raw.action.metadata.is_object() {
            return self.skip("action", raw.action.id, "metadata is not a JSON object");
        }
        self.nodes[node_pos].outgoing_bindings.push(BindingState {
            id: raw.id,
            action: ActionState {
                id: raw.action.id,
                description: raw.action.description,
                is_key_action: raw.action.is_key_action,
                metadata: raw.action.metadata,
            },
            target,
        });
    }

    pub fn finish(self) -> (SnapshotDocument, Vec<SnapshotWarning>) {
        let doc = SnapshotDocument {
            format_version: SNAPSHOT_FORMAT_VERSION,
            project: self.project,
            nodes: self.nodes,
        };
        (doc, self.warnings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn project() -> ProjectState {
        ProjectState {
            title: "Harbor".to_string(),
            description: None,
            start_node_id: None,
        }
    }

    fn raw_node(id: DbId, kind: &str) -> RawNode {
        RawNode {
            id,
            scene: "dock".to_string(),
            node_type: kind.to_string(),
            level: 0,
            parent_node_id: None,
            metadata: json!({}),
        }
    }

    fn raw_event(id: DbId, node_id: DbId) -> RawEvent {
        RawEvent {
            id,
            node_id,
            speaker: String::new(),
            content: "gulls cry".to_string(),
            description: None,
            occurred_at: Utc::now(),
            event_type: "narration".to_string(),
            metadata: json!({}),
        }
    }

    fn raw_action(is_key: bool) -> RawAction {
        RawAction {
            id: Uuid::now_v7(),
            description: "look around".to_string(),
            is_key_action: is_key,
            metadata: json!({}),
        }
    }

    #[test]
    fn builds_full_closure() {
        let (n1, n2, e1) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut b = SnapshotBuilder::new(Uuid::now_v7(), project());
        b.add_node(raw_node(n1, "scene"));
        b.add_node(raw_node(n2, "event"));
        b.add_event(raw_event(e1, n1));
        b.add_event_action(e1, raw_action(false));
        b.add_binding(RawBinding {
            id: Uuid::now_v7(),
            source_node_id: n1,
            target_node_id: Some(n2),
            target_event_id: None,
            action: raw_action(true),
        });
        b.add_binding(RawBinding {
            id: Uuid::now_v7(),
            source_node_id: n2,
            target_node_id: None,
            target_event_id: Some(e1),
            action: raw_action(false),
        });

        let (doc, warnings) = b.finish();
        assert!(warnings.is_empty());
        assert_eq!(doc.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(
            doc.counts(),
            StructureCounts {
                nodes: 2,
                events: 1,
                actions: 3,
                bindings: 2
            }
        );
        assert_eq!(doc.nodes[1].node_type, NodeType::Event);
    }

    #[test]
    fn malformed_node_is_skipped_with_warning_and_drags_its_children() {
        let (good, bad, ev) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut b = SnapshotBuilder::new(Uuid::now_v7(), project());
        b.add_node(raw_node(good, "scene"));
        b.add_node(raw_node(bad, "cutscene"));
        b.add_event(raw_event(ev, bad));

        let (doc, warnings) = b.finish();
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].entity, "node");
        assert_eq!(warnings[0].id, bad);
        assert_eq!(warnings[1].entity, "event");
    }

    #[test]
    fn illegal_binding_shape_is_skipped() {
        let n1 = Uuid::now_v7();
        let mut b = SnapshotBuilder::new(Uuid::now_v7(), project());
        b.add_node(raw_node(n1, "scene"));
        b.add_binding(RawBinding {
            id: Uuid::now_v7(),
            source_node_id: n1,
            target_node_id: Some(n1),
            target_event_id: None,
            action: raw_action(false),
        });
        let (doc, warnings) = b.finish();
        assert!(doc.nodes[0].outgoing_bindings.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().starts_with("skipped binding"));
    }

    #[test]
    fn key_action_under_event_is_skipped() {
        let (n1, e1) = (Uuid::now_v7(), Uuid::now_v7());
        let mut b = SnapshotBuilder::new(Uuid::now_v7(), project());
        b.add_node(raw_node(n1, "scene"));
        b.add_event(raw_event(e1, n1));
        b.add_event_action(e1, raw_action(true));
        let (doc, warnings) = b.finish();
        assert!(doc.nodes[0].events[0].actions.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn document_survives_json_and_rejects_unknown_version() {
        let n1 = Uuid::now_v7();
        let mut b = SnapshotBuilder::new(Uuid::now_v7(), project());
        b.add_node(raw_node(n1, "scene"));
        let (doc, _) = b.finish();

        let value = doc.to_value().unwrap();
        assert_eq!(SnapshotDocument::from_value(value.clone()).unwrap(), doc);

        let mut future = value;
        future["format_version"] = json!(99);
        assert_matches!(
            SnapshotDocument::from_value(future),
            Err(CoreError::Validation(msg)) if msg.contains("99")
        );
        assert_matches!(
            SnapshotDocument::from_value(json!({"nodes": "nope"})),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn structural_view_ignores_action_and_binding_ids() {
        let (n1, n2) = (Uuid::now_v7(), Uuid::now_v7());
        let build = || {
            let mut b = SnapshotBuilder::new(Uuid::nil(), project());
            b.add_node(raw_node(n1, "scene"));
            b.add_node(raw_node(n2, "scene"));
            b.add_binding(RawBinding {
                id: Uuid::now_v7(),
                source_node_id: n1,
                target_node_id: Some(n2),
                target_event_id: None,
                action: raw_action(true),
            });
            b.finish().0
        };
        let (a, b) = (build(), build());
        assert_ne!(a, b);
        assert_eq!(a.structural_view(), b.structural_view());
    }
}
