use chrono::Utc;
use entity::{SoftDelete, comment};
use platform_api::ValidationErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, QueryFilter,
    QueryOrder, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    activity,
    actor::Actor,
    error::{BoardsError, BoardsResult},
    messages, permissions, validate,
};

pub const PARENT_OTHER_TASK: &str = "Parent comment belongs to another task.";

#[derive(Clone, Debug, Deserialize)]
pub struct NewComment {
    pub task_id: Uuid,
    pub body: String,
    /// Set when replying to another comment on the same task.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Post a comment (or a reply) authored by `actor`.
pub async fn create_comment<C>(
    db: &C,
    actor: &Actor,
    input: NewComment,
) -> BoardsResult<comment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let scope = permissions::ensure_task_access(db, actor, input.task_id).await?;
    let mut errors = ValidationErrors::new();
    validate::not_blank(&mut errors, "body", &input.body);
    if let Some(parent_id) = input.parent_id {
        match comment::Entity::find_active_by_id(parent_id).one(db).await? {
            Some(parent) if parent.task_id == scope.task.id => {}
            Some(_) => errors.add("parent", PARENT_OTHER_TASK),
            None => errors.add("parent", validate::DOES_NOT_EXIST),
        }
    }
    errors.into_result()?;

    let txn = db.begin().await?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = comment::ActiveModel {
        id: Set(Uuid::new_v4()),
        body: Set(input.body),
        task_id: Set(scope.task.id),
        author_id: Set(actor.user_id),
        parent_id: Set(input.parent_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    activity::record(
        &txn,
        created.task_id,
        actor.user_id,
        messages::comment_created(&actor.display_name, created.parent_id.is_some()),
    )
    .await;
    txn.commit().await?;
    Ok(created)
}

/// Edit a comment body. Only the author or staff may edit; an unchanged
/// body is not logged.
pub async fn update_comment<C>(
    db: &C,
    actor: &Actor,
    comment_id: Uuid,
    body: &str,
) -> BoardsResult<comment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let existing = comment::Entity::find_active_by_id(comment_id)
        .one(db)
        .await?
        .ok_or_else(|| BoardsError::not_found("comment", comment_id))?;
    permissions::ensure_task_access(db, actor, existing.task_id).await?;
    if existing.author_id != actor.user_id && !actor.is_staff {
        return Err(BoardsError::Forbidden);
    }
    let mut errors = ValidationErrors::new();
    validate::not_blank(&mut errors, "body", body);
    errors.into_result()?;
    if existing.body == body {
        return Ok(existing);
    }

    let txn = db.begin().await?;
    let task_id = existing.task_id;
    let mut active: comment::ActiveModel = existing.into();
    active.body = Set(body.to_string());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;
    activity::record(
        &txn,
        task_id,
        actor.user_id,
        messages::comment_updated(&actor.display_name),
    )
    .await;
    txn.commit().await?;
    Ok(updated)
}

/// Active comments on a task, oldest first. Replies are included.
pub async fn get_comment<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
) -> BoardsResult<Vec<comment::Model>> {
    Ok(comment::Entity::find_active()
        .filter(comment::Column::TaskId.eq(task_id))
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(conn)
        .await?)
}

/// Active direct replies to a comment, oldest first.
pub async fn replies<C: ConnectionTrait>(
    conn: &C,
    comment_id: Uuid,
) -> BoardsResult<Vec<comment::Model>> {
    Ok(comment::Entity::find_active()
        .filter(comment::Column::ParentId.eq(comment_id))
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(conn)
        .await?)
}
