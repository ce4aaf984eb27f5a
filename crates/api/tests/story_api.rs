//! HTTP-level integration tests for the story graph endpoints.
//!
//! Requests go straight to the router through `tower::ServiceExt` without a
//! TCP listener.

mod common;

use axum::http::StatusCode;
use common::{body_json, create, delete, get, get_anonymous, id_of, post_json, put_json};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

async fn new_project(pool: &PgPool, owner: Uuid) -> String {
    let project = create(pool, "/api/v1/projects", owner, json!({"title": "Saga"})).await;
    id_of(&project)
}

async fn new_node(pool: &PgPool, owner: Uuid, project: &str, scene: &str) -> String {
    let node = create(
        pool,
        &format!("/api/v1/projects/{project}/nodes"),
        owner,
        json!({"scene": scene}),
    )
    .await;
    id_of(&node)
}

// ---------------------------------------------------------------------------
// Projects and identity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_project_returns_201_with_envelope(pool: PgPool) {
    let owner = Uuid::now_v7();
    let response = post_json(
        common::build_test_app(pool),
        "/api/v1/projects",
        owner,
        json!({"title": "Saga", "style": "noir"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Saga");
    assert_eq!(json["data"]["style"], "noir");
    assert_eq!(json["data"]["owner_id"], owner.to_string());
    assert!(json["data"]["start_node_id"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_or_bad_user_header_is_401(pool: PgPool) {
    let response = get_anonymous(common::build_test_app(pool.clone()), "/api/v1/projects").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    let request = axum::http::Request::builder()
        .uri("/api/v1/projects")
        .header("x-user-id", "not-a-uuid")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(common::build_test_app(pool), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_foreign_project_is_403(pool: PgPool) {
    let owner = Uuid::now_v7();
    let stranger = Uuid::now_v7();
    let project = new_project(&pool, owner).await;

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project}"),
        stranger,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "ACCESS_DENIED");

    let node = new_node(&pool, owner, &project, "hidden").await;
    let response = delete(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/nodes/{node}"),
        stranger,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Listing only returns the caller's own projects.
    let response = get(common::build_test_app(pool), "/api/v1/projects", stranger).await;
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_project_is_404(pool: PgPool) {
    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{}", Uuid::now_v7()),
        Uuid::now_v7(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_project_sets_and_clears_start_node(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let first = new_node(&pool, owner, &project, "first").await;
    let second = new_node(&pool, owner, &project, "second").await;
    let uri = format!("/api/v1/projects/{project}");

    let response = get(common::build_test_app(pool.clone()), &uri, owner).await;
    assert_eq!(body_json(response).await["data"]["start_node_id"], first);

    let response = put_json(
        common::build_test_app(pool.clone()),
        &uri,
        owner,
        json!({"title": "Renamed", "start_node_id": second}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Renamed");
    assert_eq!(json["data"]["start_node_id"], second);

    // Absent leaves it alone.
    let response = put_json(
        common::build_test_app(pool.clone()),
        &uri,
        owner,
        json!({"style": "epic"}),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["start_node_id"], second);

    let response = put_json(
        common::build_test_app(pool.clone()),
        &uri,
        owner,
        json!({"start_node_id": null}),
    )
    .await;
    assert!(body_json(response).await["data"]["start_node_id"].is_null());

    // A node from another project is rejected.
    let other = new_project(&pool, owner).await;
    let foreign = new_node(&pool, owner, &other, "elsewhere").await;
    let response = put_json(
        common::build_test_app(pool),
        &uri,
        owner,
        json!({"start_node_id": foreign}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONSTRAINT_VIOLATION");
}

// ---------------------------------------------------------------------------
// Nodes, events, bindings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_node_type_is_rejected(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let response = post_json(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project}/nodes"),
        owner,
        json!({"scene": "x", "node_type": "cutscene"}),
    )
    .await;
    // Rejected while decoding the body.
    assert!(response.status().is_client_error());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_key_binding_to_event_is_409(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let node = new_node(&pool, owner, &project, "hall").await;
    let event = create(
        &pool,
        &format!("/api/v1/nodes/{node}/events"),
        owner,
        json!({"content": "a bell rings", "event_type": "narration"}),
    )
    .await;
    let key = create(
        &pool,
        &format!("/api/v1/projects/{project}/actions"),
        owner,
        json!({"description": "run", "is_key_action": true}),
    )
    .await;

    let response = post_json(
        common::build_test_app(pool),
        &format!("/api/v1/nodes/{node}/bindings"),
        owner,
        json!({"action_id": id_of(&key), "target_event_id": id_of(&event)}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONSTRAINT_VIOLATION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_event_actions_must_be_regular(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let node = new_node(&pool, owner, &project, "hall").await;
    let event = create(
        &pool,
        &format!("/api/v1/nodes/{node}/events"),
        owner,
        json!({"speaker": "Guard", "content": "Halt!", "event_type": "dialogue"}),
    )
    .await;
    let uri = format!("/api/v1/events/{}/actions", id_of(&event));

    let ok = create(&pool, &uri, owner, json!({"description": "salute"})).await;
    assert_eq!(ok["is_key_action"], false);
    assert_eq!(ok["event_id"], event["id"]);

    let response = post_json(
        common::build_test_app(pool),
        &uri,
        owner,
        json!({"description": "flee", "is_key_action": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_branching_and_graph_queries(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let root = new_node(&pool, owner, &project, "crossroads").await;
    let island = new_node(&pool, owner, &project, "island").await;

    let children = create(
        &pool,
        &format!("/api/v1/nodes/{root}/branches"),
        owner,
        json!({"choices": [
            {"action_description": "go north", "scene": "forest"},
            {"action_description": "go south", "scene": "desert"}
        ]}),
    )
    .await;
    let children = children.as_array().unwrap().clone();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["level"], 1);
    assert_eq!(children[0]["parent_node_id"], root);

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/nodes/{root}/bindings"),
        owner,
    )
    .await;
    let bindings = body_json(response).await["data"].clone();
    assert_eq!(bindings.as_array().unwrap().len(), 2);
    assert_eq!(bindings[0]["is_key_action"], true);

    let graph = format!("/api/v1/projects/{project}/graph");
    let response = get(common::build_test_app(pool.clone()), &format!("{graph}/reachable"), owner).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["start_node_id"], root);
    assert_eq!(json["data"]["node_ids"].as_array().unwrap().len(), 3);

    let response =
        get(common::build_test_app(pool.clone()), &format!("{graph}/unreachable"), owner).await;
    assert_eq!(body_json(response).await["data"]["node_ids"], json!([island]));

    let response = get(common::build_test_app(pool.clone()), &format!("{graph}/validate"), owner).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["is_clean"], false);
    assert_eq!(json["data"]["unreachable_nodes"], json!([island]));

    let response = get(common::build_test_app(pool.clone()), &format!("{graph}/stats"), owner).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["total_nodes"], 4);
    assert_eq!(json["data"]["key_bindings"], 2);
    assert_eq!(json["data"]["unreachable_nodes"], 1);

    let response = get(common::build_test_app(pool), &format!("{graph}/document"), owner).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["document"]["format_version"], 1);
    assert_eq!(json["data"]["document"]["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(json["data"]["warnings"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_empty_branch_request_is_400(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let root = new_node(&pool, owner, &project, "crossroads").await;
    let response = post_json(
        common::build_test_app(pool),
        &format!("/api/v1/nodes/{root}/branches"),
        owner,
        json!({"choices": []}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_node_then_get_is_404(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let node = new_node(&pool, owner, &project, "doomed").await;
    let uri = format!("/api/v1/nodes/{node}");

    let response = delete(common::build_test_app(pool.clone()), &uri, owner).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(common::build_test_app(pool.clone()), &uri, owner).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{project}"),
        owner,
    )
    .await;
    assert!(body_json(response).await["data"]["start_node_id"].is_null());
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_snapshot_and_rollback_round_trip(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let root = new_node(&pool, owner, &project, "origin").await;
    let history = format!("/api/v1/projects/{project}/history");

    let snap = create(
        &pool,
        &format!("{history}/snapshot"),
        owner,
        json!({"operation_type": "manual", "operation_description": "one node"}),
    )
    .await;
    assert_eq!(snap["warnings"], json!([]));
    let snapshot_id = snap["entry"]["id"].as_str().unwrap().to_string();

    new_node(&pool, owner, &project, "added later").await;

    let response = post_json(
        common::build_test_app(pool.clone()),
        &format!("{history}/rollback"),
        owner,
        json!({"snapshot_id": snapshot_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["restored"]["nodes"], 1);
    assert_eq!(json["data"]["rollback_point"]["operation_type"], "rollback_point");

    let response = get(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{project}/nodes"),
        owner,
    )
    .await;
    let nodes = body_json(response).await["data"].clone();
    assert_eq!(nodes.as_array().unwrap().len(), 1);
    assert_eq!(nodes[0]["id"], root);

    let response = get(common::build_test_app(pool.clone()), &history, owner).await;
    let entries = body_json(response).await["data"].clone();
    assert_eq!(entries.as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["operation_type"], "rollback_point");
    assert!(entries[0].get("snapshot_data").is_none());

    let response = delete(
        common::build_test_app(pool.clone()),
        &format!("{history}/{snapshot_id}"),
        owner,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        common::build_test_app(pool),
        &format!("{history}/rollback"),
        owner,
        json!({"snapshot_id": snapshot_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_history_listing_is_capped(pool: PgPool) {
    let owner = Uuid::now_v7();
    let project = new_project(&pool, owner).await;
    let history = format!("/api/v1/projects/{project}/history");
    for i in 0..6 {
        create(
            &pool,
            &format!("{history}/snapshot"),
            owner,
            json!({"operation_type": "manual", "operation_description": format!("edit {i}")}),
        )
        .await;
    }

    let response = get(common::build_test_app(pool.clone()), &history, owner).await;
    let entries = body_json(response).await["data"].clone();
    assert_eq!(entries.as_array().unwrap().len(), 5);
    assert_eq!(entries[0]["operation_description"], "edit 5");

    let response = get(common::build_test_app(pool), &format!("{history}?limit=2"), owner).await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
}
