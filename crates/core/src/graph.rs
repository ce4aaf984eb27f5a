//! In-memory story graph and the reachability analyzer.
//!
//! Nodes live in an arena keyed by id and bindings store ids only, so cycles
//! need no special handling beyond a visited set. The graph is read-only
//! once built; every query here is side-effect-free.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::binding::{validate_binding, BindingTarget};
use crate::snapshot::SnapshotDocument;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// A binding as stored, before its shape has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub binding_id: DbId,
    pub action_id: DbId,
    pub is_key_action: bool,
    pub source_node_id: DbId,
    pub target_node_id: Option<DbId>,
    pub target_event_id: Option<DbId>,
}

#[derive(Debug, Clone, Default)]
pub struct StoryGraph {
    start_node_id: Option<DbId>,
    /// node id -> outgoing edge positions
    nodes: BTreeMap<DbId, Vec<usize>>,
    /// event id -> owning node id
    events: HashMap<DbId, DbId>,
    /// action id -> owning event id
    actions: BTreeMap<DbId, Option<DbId>>,
    edges: Vec<GraphEdge>,
}

impl StoryGraph {
    pub fn new(start_node_id: Option<DbId>) -> Self {
        Self {
            start_node_id,
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, node_id: DbId) {
        self.nodes.entry(node_id).or_default();
    }

    pub fn add_event(&mut self, event_id: DbId, node_id: DbId) {
        self.events.insert(event_id, node_id);
    }

    pub fn add_action(&mut self, action_id: DbId, event_id: Option<DbId>) {
        self.actions.insert(action_id, event_id);
    }

    /// Add nodes first. An edge whose source is unknown is kept only for the
    /// issue lists.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        let pos = self.edges.len();
        if let Some(out) = self.nodes.get_mut(&edge.source_node_id) {
            out.push(pos);
        }
        self.actions.entry(edge.action_id).or_insert(None);
        self.edges.push(edge);
    }

    /// Rebuild the arena from a snapshot document.
    pub fn from_document(doc: &SnapshotDocument) -> Self {
        let mut graph = StoryGraph::new(doc.project.start_node_id);
        for node in &doc.nodes {
            graph.add_node(node.id);
        }
        for node in &doc.nodes {
            for event in &node.events {
                graph.add_event(event.id, node.id);
                for action in &event.actions {
                    graph.add_action(action.id, Some(event.id));
                }
            }
            for binding in &node.outgoing_bindings {
                let (target_node_id, target_event_id) = binding.target.columns();
                graph.add_edge(GraphEdge {
                    binding_id: binding.id,
                    action_id: binding.action.id,
                    is_key_action: binding.action.is_key_action,
                    source_node_id: node.id,
                    target_node_id,
                    target_event_id,
                });
            }
        }
        graph
    }

    pub fn start_node_id(&self) -> Option<DbId> {
        self.start_node_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // -----------------------------------------------------------------------
    // Reachability
    // -----------------------------------------------------------------------

    /// Nodes reachable from the start node over key bindings only.
    ///
    /// Iterative DFS; each node is expanded at most once. Without a start
    /// node (or with one outside the graph) nothing is reachable.
    pub fn reachable_nodes(&self) -> BTreeSet<DbId> {
        let mut visited = BTreeSet::new();
        let Some(start) = self.start_node_id.filter(|id| self.nodes.contains_key(id)) else {
            return visited;
        };

        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(out) = self.nodes.get(&current) else {
                continue;
            };
            for &pos in out {
                let edge = &self.edges[pos];
                let Ok(BindingTarget::Node(next)) =
                    validate_binding(edge.is_key_action, edge.target_node_id, edge.target_event_id)
                else {
                    continue;
                };
                if self.nodes.contains_key(&next) && !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        visited
    }

    /// Complement of [`Self::reachable_nodes`] within this graph's node set.
    pub fn unreachable_nodes(&self) -> BTreeSet<DbId> {
        let reachable = self.reachable_nodes();
        self.nodes
            .keys()
            .filter(|id| !reachable.contains(*id))
            .copied()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> GraphIssues {
        let mut issues = GraphIssues {
            unreachable_nodes: self.unreachable_nodes().into_iter().collect(),
            ..Default::default()
        };

        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.source_node_id) {
                issues.invalid_bindings.push(InvalidBinding {
                    binding_id: edge.binding_id,
                    reason: "source node is not part of the project".to_string(),
                });
                continue;
            }
            match validate_binding(edge.is_key_action, edge.target_node_id, edge.target_event_id) {
                Err(e) => issues.invalid_bindings.push(InvalidBinding {
                    binding_id: edge.binding_id,
                    reason: e.to_string(),
                }),
                Ok(target) => {
                    let exists = match target {
                        BindingTarget::Node(id) => self.nodes.contains_key(&id),
                        BindingTarget::Event(id) => self
                            .events
                            .get(&id)
                            .is_some_and(|owner| self.nodes.contains_key(owner)),
                    };
                    if !exists {
                        issues.missing_targets.push(MissingTarget {
                            binding_id: edge.binding_id,
                            source_node_id: edge.source_node_id,
                            target,
                        });
                    }
                }
            }
        }

        issues.orphaned_events = self
            .events
            .iter()
            .filter(|(_, owner)| !self.nodes.contains_key(*owner))
            .map(|(id, _)| *id)
            .collect();
        issues.orphaned_events.sort();

        let bound: HashSet<DbId> = self.edges.iter().map(|e| e.action_id).collect();
        issues.orphaned_actions = self
            .actions
            .iter()
            .filter(|(id, owner)| match owner {
                Some(event_id) => !self.events.contains_key(event_id),
                None => !bound.contains(*id),
            })
            .map(|(id, _)| *id)
            .collect();

        issues
    }

    pub fn stats(&self) -> GraphStats {
        let key_bindings = self.edges.iter().filter(|e| e.is_key_action).count();
        GraphStats {
            total_nodes: self.nodes.len(),
            total_events: self.events.len(),
            total_bindings: self.edges.len(),
            key_bindings,
            regular_bindings: self.edges.len() - key_bindings,
            unreachable_nodes: self.unreachable_nodes().len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidBinding {
    pub binding_id: DbId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTarget {
    pub binding_id: DbId,
    pub source_node_id: DbId,
    pub target: BindingTarget,
}

/// Categorized findings of [`StoryGraph::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphIssues {
    pub unreachable_nodes: Vec<DbId>,
    pub invalid_bindings: Vec<InvalidBinding>,
    pub missing_targets: Vec<MissingTarget>,
    pub orphaned_events: Vec<DbId>,
    pub orphaned_actions: Vec<DbId>,
}

impl GraphIssues {
    pub fn is_clean(&self) -> bool {
        self.unreachable_nodes.is_empty()
            && self.invalid_bindings.is_empty()
            && self.missing_targets.is_empty()
            && self.orphaned_events.is_empty()
            && self.orphaned_actions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_events: usize,
    pub total_bindings: usize,
    pub key_bindings: usize,
    pub regular_bindings: usize,
    pub unreachable_nodes: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
