//! Ownership lookups shared by every handler.
//!
//! Each helper loads the addressed row, walks up to its project and checks
//! that the caller owns it. A missing row is a 404; a foreign project is a 403.

use plotweave_core::error::CoreError;
use plotweave_core::story::ensure_project_owner;
use plotweave_core::types::DbId;
use plotweave_db::models::action::Action;
use plotweave_db::models::binding::ActionBinding;
use plotweave_db::models::event::NarrativeEvent;
use plotweave_db::models::node::NarrativeNode;
use plotweave_db::models::project::NarrativeProject;
use plotweave_db::repositories::{ActionBindingRepo, ActionRepo, EventRepo, NodeRepo, ProjectRepo};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;

fn not_found(entity: &'static str, id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity, id })
}

pub async fn owned_project(
    pool: &PgPool,
    project_id: DbId,
    user: &AuthUser,
) -> AppResult<NarrativeProject> {
    let project = ProjectRepo::find_by_id(pool, project_id)
        .await?
        .ok_or_else(|| not_found("project", project_id))?;
    ensure_project_owner(project.id, project.owner_id, user.user_id)?;
    Ok(project)
}

pub async fn owned_node(pool: &PgPool, node_id: DbId, user: &AuthUser) -> AppResult<NarrativeNode> {
    let node = NodeRepo::find_by_id(pool, node_id)
        .await?
        .ok_or_else(|| not_found("node", node_id))?;
    owned_project(pool, node.project_id, user).await?;
    Ok(node)
}

pub async fn owned_event(
    pool: &PgPool,
    event_id: DbId,
    user: &AuthUser,
) -> AppResult<NarrativeEvent> {
    let event = EventRepo::find_by_id(pool, event_id)
        .await?
        .ok_or_else(|| not_found("event", event_id))?;
    owned_node(pool, event.node_id, user).await?;
    Ok(event)
}

pub async fn owned_action(pool: &PgPool, action_id: DbId, user: &AuthUser) -> AppResult<Action> {
    let action = ActionRepo::find_by_id(pool, action_id)
        .await?
        .ok_or_else(|| not_found("action", action_id))?;
    owned_project(pool, action.project_id, user).await?;
    Ok(action)
}

pub async fn owned_binding(
    pool: &PgPool,
    binding_id: DbId,
    user: &AuthUser,
) -> AppResult<ActionBinding> {
    let binding = ActionBindingRepo::find_by_id(pool, binding_id)
        .await?
        .ok_or_else(|| not_found("binding", binding_id))?;
    owned_node(pool, binding.source_node_id, user).await?;
    Ok(binding)
}

/// Map a `false` from a repository delete (row vanished after the ownership
/// check) to a 404.
pub fn deleted_or_not_found(deleted: bool, entity: &'static str, id: DbId) -> AppResult<()> {
    if deleted {
        Ok(())
    } else {
        Err(not_found(entity, id))
    }
}

pub fn updated_or_not_found<T>(row: Option<T>, entity: &'static str, id: DbId) -> AppResult<T> {
    row.ok_or_else(|| not_found(entity, id))
}
