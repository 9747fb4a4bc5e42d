use chrono::Utc;
use entity::{SoftDelete, attachment, task, task_list};
use platform_api::ValidationErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    activity,
    actor::Actor,
    error::{BoardsError, BoardsResult},
    messages, permissions, validate,
};

/// A file already stored elsewhere; `file` is its opaque storage path.
#[derive(Clone, Debug, Deserialize)]
pub struct NewAttachment {
    pub task_id: Uuid,
    pub file: String,
}

pub async fn create_attachment<C>(
    db: &C,
    actor: &Actor,
    input: NewAttachment,
) -> BoardsResult<attachment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let scope = permissions::ensure_task_access(db, actor, input.task_id).await?;
    let mut errors = ValidationErrors::new();
    validate::not_blank(&mut errors, "file", &input.file);
    errors.into_result()?;

    let txn = db.begin().await?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = attachment::ActiveModel {
        id: Set(Uuid::new_v4()),
        file: Set(input.file.trim().to_string()),
        task_id: Set(scope.task.id),
        owner_id: Set(actor.user_id),
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
        messages::attachment_created(&actor.display_name),
    )
    .await;
    txn.commit().await?;
    Ok(created)
}

/// Active attachments of a task, oldest first.
pub async fn get_attachments<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
) -> BoardsResult<Vec<attachment::Model>> {
    Ok(attachment::Entity::find_active()
        .filter(attachment::Column::TaskId.eq(task_id))
        .order_by_asc(attachment::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Active attachments uploaded by the owner of `attachment_id` anywhere on
/// the same board, the attachment itself included. Attachments on archived
/// tasks or lists are left out.
pub async fn owner_attachments_on_board<C: ConnectionTrait>(
    conn: &C,
    attachment_id: Uuid,
) -> BoardsResult<Vec<attachment::Model>> {
    let anchor = attachment::Entity::find_original_by_id(attachment_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("attachment", attachment_id))?;
    let board_id: Option<Uuid> = task::Entity::find_original_by_id(anchor.task_id)
        .select_only()
        .column(task_list::Column::BoardId)
        .inner_join(task_list::Entity)
        .into_tuple()
        .one(conn)
        .await?;
    let Some(board_id) = board_id else {
        return Err(BoardsError::not_found("task", anchor.task_id));
    };

    let lists = task_list::Entity::find_active()
        .select_only()
        .column(task_list::Column::Id)
        .filter(task_list::Column::BoardId.eq(board_id))
        .into_query();
    let tasks = task::Entity::find_active()
        .select_only()
        .column(task::Column::Id)
        .filter(task::Column::TaskListId.in_subquery(lists))
        .into_query();
    Ok(attachment::Entity::find_active()
        .filter(attachment::Column::OwnerId.eq(anchor.owner_id))
        .filter(attachment::Column::TaskId.in_subquery(tasks))
        .order_by_asc(attachment::Column::CreatedAt)
        .all(conn)
        .await?)
}
