//! Integration tests for the history ledger and the rollback executor.

use assert_matches::assert_matches;
use plotweave_core::binding::BindingTarget;
use plotweave_core::error::CoreError;
use plotweave_core::history::ROLLBACK_POINT_OPERATION;
use plotweave_core::snapshot::SnapshotDocument;
use plotweave_core::story::EventType;
use plotweave_db::models::action::CreateAction;
use plotweave_db::models::binding::CreateActionBinding;
use plotweave_db::models::event::CreateEvent;
use plotweave_db::models::history::CreateSnapshot;
use plotweave_db::models::node::CreateNode;
use plotweave_db::models::project::{CreateProject, NarrativeProject};
use plotweave_db::repositories::{
    ActionBindingRepo, ActionRepo, EventRepo, HistoryRepo, NodeRepo, ProjectRepo, StoryGraphRepo,
};
use plotweave_db::rollback::{ReconstructStep, RollbackError, RollbackExecutor};
use plotweave_db::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_scene(scene: &str) -> CreateNode {
    CreateNode {
        scene: scene.to_string(),
        node_type: None,
        level: None,
        parent_node_id: None,
        metadata: None,
    }
}

fn new_narration(content: &str) -> CreateEvent {
    CreateEvent {
        speaker: None,
        content: content.to_string(),
        description: None,
        occurred_at: None,
        event_type: Some(EventType::Narration),
        metadata: None,
    }
}

fn new_key_action(description: &str) -> CreateAction {
    CreateAction {
        description: description.to_string(),
        is_key_action: true,
        metadata: None,
    }
}

fn new_regular_action(description: &str) -> CreateAction {
    CreateAction {
        description: description.to_string(),
        is_key_action: false,
        metadata: None,
    }
}

fn bind_to_node(action_id: Uuid, node_id: Uuid) -> CreateActionBinding {
    CreateActionBinding {
        action_id,
        target_node_id: Some(node_id),
        target_event_id: None,
    }
}

fn bind_to_event(action_id: Uuid, event_id: Uuid) -> CreateActionBinding {
    CreateActionBinding {
        action_id,
        target_node_id: None,
        target_event_id: Some(event_id),
    }
}

fn new_snapshot(operation_type: &str, description: &str) -> CreateSnapshot {
    CreateSnapshot {
        operation_type: operation_type.to_string(),
        operation_description: Some(description.to_string()),
        affected_node_id: None,
    }
}

async fn new_project(pool: &PgPool) -> NarrativeProject {
    ProjectRepo::create(
        pool,
        Uuid::now_v7(),
        &CreateProject {
            title: "Ledger".to_string(),
            description: Some("history tests".to_string()),
            world_setting: None,
            style: None,
            metadata: None,
        },
    )
    .await
    .unwrap()
}

async fn snapshot(pool: &PgPool, project: &NarrativeProject, description: &str) -> Uuid {
    let (entry, warnings) = HistoryRepo::create_snapshot(
        pool,
        project.id,
        project.owner_id,
        &new_snapshot("manual", description),
    )
    .await
    .unwrap();
    assert!(warnings.is_empty());
    entry.id
}

async fn current_document(pool: &PgPool, project_id: Uuid) -> SnapshotDocument {
    StoryGraphRepo::load_document(pool, project_id)
        .await
        .unwrap()
        .unwrap()
        .0
}

/// Edit a stored document in place, bypassing the repositories.
async fn tamper(pool: &PgPool, snapshot_id: Uuid, edit: impl FnOnce(&mut SnapshotDocument)) {
    let (data,): (serde_json::Value,) =
        sqlx::query_as("SELECT snapshot_data FROM story_edit_history WHERE id = $1")
            .bind(snapshot_id)
            .fetch_one(pool)
            .await
            .unwrap();
    let mut doc = SnapshotDocument::from_value(data).unwrap();
    edit(&mut doc);
    sqlx::query("UPDATE story_edit_history SET snapshot_data = $2 WHERE id = $1")
        .bind(snapshot_id)
        .bind(doc.to_value().unwrap())
        .execute(pool)
        .await
        .unwrap();
}

/// 3 nodes, 2 events, 2 bindings: n1 -key-> n2, n1 -regular-> event on n2.
async fn seed_three_nodes(pool: &PgPool, project: &NarrativeProject) -> [Uuid; 3] {
    let n1 = NodeRepo::create(pool, project.id, &new_scene("harbor"))
        .await
        .unwrap();
    let n2 = NodeRepo::create(pool, project.id, &new_scene("market"))
        .await
        .unwrap();
    let n3 = NodeRepo::create(pool, project.id, &new_scene("temple"))
        .await
        .unwrap();

    EventRepo::create(pool, n1.id, &new_narration("gulls circle"))
        .await
        .unwrap();
    let shout = EventRepo::create(pool, n2.id, &new_narration("a merchant shouts"))
        .await
        .unwrap();
    ActionRepo::create_for_event(pool, shout.id, &new_regular_action("haggle"))
        .await
        .unwrap();

    let walk = ActionRepo::create(pool, project.id, &new_key_action("walk inland"))
        .await
        .unwrap();
    ActionBindingRepo::create(pool, n1.id, &bind_to_node(walk.id, n2.id))
        .await
        .unwrap();
    let listen = ActionRepo::create(pool, project.id, &new_regular_action("listen"))
        .await
        .unwrap();
    ActionBindingRepo::create(pool, n1.id, &bind_to_event(listen.id, shout.id))
        .await
        .unwrap();

    [n1.id, n2.id, n3.id]
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_history_is_capped_at_five_newest(pool: PgPool) {
    let project = new_project(&pool).await;
    let mut ids = Vec::new();
    for i in 0..7 {
        ids.push(snapshot(&pool, &project, &format!("edit {i}")).await);
    }

    let history = HistoryRepo::list(&pool, project.id, 5).await.unwrap();
    assert_eq!(history.len(), 5);
    let listed: Vec<Uuid> = history.iter().map(|h| h.id).collect();
    let expected: Vec<Uuid> = ids.iter().rev().take(5).copied().collect();
    assert_eq!(listed, expected);
    assert_eq!(HistoryRepo::count(&pool, project.id).await.unwrap(), 5);

    let latest = HistoryRepo::latest(&pool, project.id).await.unwrap().unwrap();
    assert_eq!(latest.id, ids[6]);
    assert_eq!(latest.operation_description.as_deref(), Some("edit 6"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_snapshot_rejects_bad_operation_type(pool: PgPool) {
    let project = new_project(&pool).await;
    let result = HistoryRepo::create_snapshot(
        &pool,
        project.id,
        project.owner_id,
        &new_snapshot("", "nothing"),
    )
    .await;
    assert_matches!(result, Err(StoreError::Core(CoreError::Validation(_))));

    let missing = HistoryRepo::create_snapshot(
        &pool,
        Uuid::now_v7(),
        project.owner_id,
        &new_snapshot("manual", "ghost"),
    )
    .await;
    assert_matches!(
        missing,
        Err(StoreError::Core(CoreError::NotFound { entity: "project", .. }))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_snapshot_is_scoped_to_project(pool: PgPool) {
    let a = new_project(&pool).await;
    let b = new_project(&pool).await;
    let snap = snapshot(&pool, &a, "mine").await;

    let foreign = HistoryRepo::delete(&pool, b.id, snap).await;
    assert_matches!(
        foreign,
        Err(StoreError::Core(CoreError::NotFound { entity: "snapshot", .. }))
    );

    HistoryRepo::delete(&pool, a.id, snap).await.unwrap();
    assert_eq!(HistoryRepo::count(&pool, a.id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_snapshot_document_is_full_closure(pool: PgPool) {
    let project = new_project(&pool).await;
    seed_three_nodes(&pool, &project).await;
    let id = snapshot(&pool, &project, "seeded").await;

    let entry = HistoryRepo::latest(&pool, project.id).await.unwrap().unwrap();
    assert_eq!(entry.id, id);
    let doc = SnapshotDocument::from_value(entry.snapshot_data).unwrap();
    let counts = doc.counts();
    assert_eq!(counts.nodes, 3);
    assert_eq!(counts.events, 2);
    assert_eq!(counts.bindings, 2);
    // Two bound actions plus the event's sub-choice.
    assert_eq!(counts.actions, 3);
    assert_eq!(doc.project.title, "Ledger");
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_scenario_c_rollback_restores_and_records_point(pool: PgPool) {
    let project = new_project(&pool).await;
    let [n1, _, _] = seed_three_nodes(&pool, &project).await;
    let before = current_document(&pool, project.id).await;
    let snap = snapshot(&pool, &project, "three nodes").await;

    NodeRepo::create(&pool, project.id, &new_scene("lighthouse"))
        .await
        .unwrap();
    assert_eq!(current_document(&pool, project.id).await.nodes.len(), 4);

    let outcome = RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap();
    assert_eq!(outcome.restored.nodes, 3);
    assert_eq!(outcome.restored.events, 2);
    assert_eq!(outcome.restored.bindings, 2);
    assert_eq!(outcome.removed.nodes, 4);
    assert!(outcome.warnings.is_empty());

    let after = current_document(&pool, project.id).await;
    let counts = after.counts();
    assert_eq!((counts.nodes, counts.events, counts.bindings), (3, 2, 2));
    assert_eq!(after.structural_view(), before.structural_view());
    assert_eq!(after.project.start_node_id, Some(n1));

    let point = HistoryRepo::latest(&pool, project.id).await.unwrap().unwrap();
    assert_eq!(point.id, outcome.rollback_point.id);
    assert_eq!(point.operation_type, ROLLBACK_POINT_OPERATION);
    assert_eq!(
        point.operation_description.as_deref(),
        Some("Before rollback to \"three nodes\"")
    );
    let pre_rollback = SnapshotDocument::from_value(point.snapshot_data).unwrap();
    assert_eq!(pre_rollback.nodes.len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rollback_is_idempotent(pool: PgPool) {
    let project = new_project(&pool).await;
    seed_three_nodes(&pool, &project).await;
    let snap = snapshot(&pool, &project, "base").await;

    NodeRepo::create(&pool, project.id, &new_scene("extra"))
        .await
        .unwrap();
    RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap();
    let first = current_document(&pool, project.id).await;

    RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap();
    let second = current_document(&pool, project.id).await;

    assert_eq!(first.structural_view(), second.structural_view());
    // Snapshot + two rollback points.
    assert_eq!(HistoryRepo::count(&pool, project.id).await.unwrap(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rollback_point_is_itself_restorable(pool: PgPool) {
    let project = new_project(&pool).await;
    let snap = snapshot(&pool, &project, "empty").await;
    seed_three_nodes(&pool, &project).await;
    let seeded = current_document(&pool, project.id).await;

    let outcome = RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap();
    assert!(current_document(&pool, project.id).await.nodes.is_empty());
    assert_eq!(
        ProjectRepo::find_by_id(&pool, project.id)
            .await
            .unwrap()
            .unwrap()
            .start_node_id,
        None
    );

    RollbackExecutor::rollback(&pool, project.id, outcome.rollback_point.id, project.owner_id)
        .await
        .unwrap();
    let restored = current_document(&pool, project.id).await;
    assert_eq!(restored.structural_view(), seeded.structural_view());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failed_rollback_leaves_everything_untouched(pool: PgPool) {
    let project = new_project(&pool).await;
    seed_three_nodes(&pool, &project).await;
    let snap = snapshot(&pool, &project, "to be corrupted").await;
    NodeRepo::create(&pool, project.id, &new_scene("survivor"))
        .await
        .unwrap();

    // Point the key binding at a node that will never exist, so the failure
    // happens mid-reconstruction, after teardown has run.
    let ghost = Uuid::now_v7();
    tamper(&pool, snap, |doc| {
        let binding = doc
            .nodes
            .iter_mut()
            .flat_map(|n| n.outgoing_bindings.iter_mut())
            .find(|b| b.action.is_key_action)
            .unwrap();
        binding.target = BindingTarget::Node(ghost);
    })
    .await;

    let before = current_document(&pool, project.id).await;
    let ledger_before = HistoryRepo::count(&pool, project.id).await.unwrap();

    let err = RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        RollbackError::Reconstruct {
            step: ReconstructStep::Bindings,
            ..
        }
    );
    assert_matches!(CoreError::from(err), CoreError::TransactionFailure(_));

    let after = current_document(&pool, project.id).await;
    assert_eq!(after, before);
    assert_eq!(after.nodes.len(), 4);
    assert_eq!(HistoryRepo::count(&pool, project.id).await.unwrap(), ledger_before);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rollback_rejects_unknown_format_before_teardown(pool: PgPool) {
    let project = new_project(&pool).await;
    seed_three_nodes(&pool, &project).await;
    let snap = snapshot(&pool, &project, "future").await;
    tamper(&pool, snap, |doc| doc.format_version = 2).await;

    let result = RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id).await;
    assert_matches!(result, Err(RollbackError::CorruptDocument(CoreError::Validation(_))));
    assert_eq!(current_document(&pool, project.id).await.nodes.len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rollback_unknown_snapshot_or_foreign_project(pool: PgPool) {
    let a = new_project(&pool).await;
    let b = new_project(&pool).await;
    let snap = snapshot(&pool, &a, "a only").await;

    let result = RollbackExecutor::rollback(&pool, b.id, snap, b.owner_id).await;
    assert_matches!(result, Err(RollbackError::SnapshotNotFound { .. }));

    let result = RollbackExecutor::rollback(&pool, Uuid::now_v7(), snap, a.owner_id).await;
    assert_matches!(result, Err(RollbackError::ProjectNotFound(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_start_node_is_left_unset_with_warning(pool: PgPool) {
    let project = new_project(&pool).await;
    seed_three_nodes(&pool, &project).await;
    let snap = snapshot(&pool, &project, "bad start").await;
    tamper(&pool, snap, |doc| doc.project.start_node_id = Some(Uuid::now_v7())).await;

    let outcome = RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("start node"));
    let project = ProjectRepo::find_by_id(&pool, project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.start_node_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rollback_leaves_unbound_templates_alone(pool: PgPool) {
    let project = new_project(&pool).await;
    seed_three_nodes(&pool, &project).await;
    let template = ActionRepo::create(&pool, project.id, &new_key_action("someday"))
        .await
        .unwrap();
    let snap = snapshot(&pool, &project, "with template").await;

    RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
        .await
        .unwrap();
    assert!(ActionRepo::find_by_id(&pool, template.id)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rollback_rebinds_template_without_duplicating_it(pool: PgPool) {
    let project = new_project(&pool).await;
    let n1 = NodeRepo::create(&pool, project.id, &new_scene("gate"))
        .await
        .unwrap();
    let n2 = NodeRepo::create(&pool, project.id, &new_scene("courtyard"))
        .await
        .unwrap();
    let walk = ActionRepo::create(&pool, project.id, &new_key_action("walk"))
        .await
        .unwrap();
    let binding = ActionBindingRepo::create(&pool, n1.id, &bind_to_node(walk.id, n2.id))
        .await
        .unwrap();
    let snap = snapshot(&pool, &project, "walk bound").await;

    // Unbinding leaves `walk` behind as a template.
    assert!(ActionBindingRepo::delete(&pool, binding.id).await.unwrap());

    for _ in 0..3 {
        RollbackExecutor::rollback(&pool, project.id, snap, project.owner_id)
            .await
            .unwrap();
    }

    let actions = ActionRepo::list_by_project(&pool, project.id).await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, walk.id);
    assert!(actions[0].is_key_action);

    let restored = ActionBindingRepo::list_by_source_node(&pool, n1.id)
        .await
        .unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].binding.action_id, walk.id);

    let issues = StoryGraphRepo::load_graph(&pool, project.id)
        .await
        .unwrap()
        .unwrap()
        .validate();
    assert!(issues.is_clean(), "{issues:?}");
}
