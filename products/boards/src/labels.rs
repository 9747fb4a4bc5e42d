//! Board labels.
//!
//! Labels have no archive state: deleting one removes it for good. Label
//! activity is written on the tasks carrying the label, since the log is
//! keyed by task.

use std::collections::BTreeSet;

use chrono::Utc;
use entity::{SoftDelete, board, label, task, task_label};
use platform_api::ValidationErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    activity,
    actor::Actor,
    error::{BoardsError, BoardsResult},
    messages, permissions, tasks, validate,
};

pub const TITLE_MAX: usize = 300;

#[derive(Clone, Debug, Deserialize)]
pub struct NewLabel {
    pub title: String,
    pub board_id: Uuid,
    /// Attach the new label to this task and log the creation there.
    #[serde(default)]
    pub task_id: Option<Uuid>,
}

pub async fn create_label<C>(db: &C, actor: &Actor, input: NewLabel) -> BoardsResult<label::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut errors = ValidationErrors::new();
    let title = validate::title(&mut errors, "title", &input.title, TITLE_MAX);
    let board_exists = board::Entity::find_active_by_id(input.board_id)
        .count(db)
        .await?
        > 0;
    if !board_exists {
        errors.add("board", validate::DOES_NOT_EXIST);
        return Err(errors.into());
    }
    permissions::ensure_board_access(db, actor, input.board_id).await?;
    let task = match input.task_id {
        Some(task_id) => {
            let found = task_on_board(db, task_id, input.board_id).await?;
            if found.is_none() {
                errors.add("task", validate::DOES_NOT_EXIST);
            }
            found
        }
        None => None,
    };
    errors.into_result()?;
    let title = title.unwrap_or_default();

    let txn = db.begin().await?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = label::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.clone()),
        board_id: Set(input.board_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    if let Some(task) = task {
        tasks::link_labels(&txn, task.id, &BTreeSet::from([created.id])).await?;
        activity::record(&txn, task.id, actor.user_id, messages::label_created(&title)).await;
    }
    txn.commit().await?;
    Ok(created)
}

/// Rename a label, logging on every active task that carries it.
pub async fn update_label<C>(
    db: &C,
    actor: &Actor,
    label_id: Uuid,
    title: &str,
) -> BoardsResult<label::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let existing = find_label(db, label_id).await?;
    permissions::ensure_board_access(db, actor, existing.board_id).await?;
    let mut errors = ValidationErrors::new();
    let title = validate::title(&mut errors, "title", title, TITLE_MAX);
    errors.into_result()?;
    let title = title.unwrap_or_default();
    if title == existing.title {
        return Ok(existing);
    }

    let txn = db.begin().await?;
    let old = existing.title.clone();
    let mut active: label::ActiveModel = existing.into();
    active.title = Set(title.clone());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;
    for task_id in carrying_task_ids(&txn, label_id).await? {
        activity::record(&txn, task_id, actor.user_id, messages::label_renamed(&old, &title))
            .await;
    }
    txn.commit().await?;
    Ok(updated)
}

/// Hard-delete a label. Each active task carrying it gets a log entry
/// before the links and the label are removed.
pub async fn delete_label<C>(db: &C, actor: &Actor, label_id: Uuid) -> BoardsResult<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.label.delete", label = %label_id, actor = %actor.user_id);
    async move {
        let existing = find_label(db, label_id).await?;
        permissions::ensure_board_access(db, actor, existing.board_id).await?;

        let txn = db.begin().await?;
        let carriers = carrying_task_ids(&txn, label_id).await?;
        for task_id in &carriers {
            activity::record(
                &txn,
                *task_id,
                actor.user_id,
                messages::label_deleted(&existing.title),
            )
            .await;
        }
        task_label::Entity::delete_many()
            .filter(task_label::Column::LabelId.eq(label_id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;
        txn.commit().await?;
        info!(tasks = carriers.len(), "label deleted");
        Ok::<_, BoardsError>(())
    }
    .instrument(span)
    .await
}

/// Put a board label on a task. Attaching twice is a no-op.
pub async fn attach_label<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    task_id: Uuid,
    label_id: Uuid,
) -> BoardsResult<()> {
    let scope = permissions::ensure_task_access(conn, actor, task_id).await?;
    let label = find_label(conn, label_id).await?;
    if label.board_id != scope.board_id() {
        return Err(BoardsError::validation("label", tasks::LABEL_OFF_BOARD));
    }
    let linked = task_label::Entity::find_by_id((task_id, label_id))
        .count(conn)
        .await?
        > 0;
    if !linked {
        tasks::link_labels(conn, task_id, &BTreeSet::from([label_id])).await?;
    }
    Ok(())
}

/// Take a label off a task. Returns whether a link was removed.
pub async fn detach_label<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    task_id: Uuid,
    label_id: Uuid,
) -> BoardsResult<bool> {
    permissions::ensure_task_access(conn, actor, task_id).await?;
    Ok(tasks::unlink_labels(conn, task_id, &[label_id]).await? > 0)
}

/// Labels defined on a board, alphabetical.
pub async fn get_board_labels<C: ConnectionTrait>(
    conn: &C,
    board_id: Uuid,
) -> BoardsResult<Vec<label::Model>> {
    Ok(label::Entity::find()
        .filter(label::Column::BoardId.eq(board_id))
        .order_by_asc(label::Column::Title)
        .all(conn)
        .await?)
}

/// Active tasks carrying a label.
pub async fn label_tasks<C: ConnectionTrait>(
    conn: &C,
    label_id: Uuid,
) -> BoardsResult<Vec<task::Model>> {
    let ids = carrying_task_ids(conn, label_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(task::Entity::find_active()
        .filter(task::Column::Id.is_in(ids))
        .order_by_asc(task::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Number of active tasks carrying the label.
pub async fn label_task_count<C: ConnectionTrait>(conn: &C, label_id: Uuid) -> BoardsResult<u64> {
    find_label(conn, label_id).await?;
    let linked = task_label::Entity::find()
        .select_only()
        .column(task_label::Column::TaskId)
        .filter(task_label::Column::LabelId.eq(label_id))
        .into_query();
    Ok(task::Entity::find_active()
        .filter(task::Column::Id.in_subquery(linked))
        .count(conn)
        .await?)
}

async fn find_label<C: ConnectionTrait>(conn: &C, label_id: Uuid) -> BoardsResult<label::Model> {
    label::Entity::find_by_id(label_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("label", label_id))
}

async fn task_on_board<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
    board_id: Uuid,
) -> BoardsResult<Option<task::Model>> {
    let Some(found) = task::Entity::find_active_by_id(task_id).one(conn).await? else {
        return Ok(None);
    };
    let on_board = entity::task_list::Entity::find_active_by_id(found.task_list_id)
        .filter(entity::task_list::Column::BoardId.eq(board_id))
        .count(conn)
        .await?
        > 0;
    Ok(on_board.then_some(found))
}

async fn carrying_task_ids<C: ConnectionTrait>(
    conn: &C,
    label_id: Uuid,
) -> BoardsResult<Vec<Uuid>> {
    let linked: Vec<Uuid> = task_label::Entity::find()
        .select_only()
        .column(task_label::Column::TaskId)
        .filter(task_label::Column::LabelId.eq(label_id))
        .into_tuple()
        .all(conn)
        .await?;
    if linked.is_empty() {
        return Ok(linked);
    }
    Ok(task::Entity::find_active()
        .select_only()
        .column(task::Column::Id)
        .filter(task::Column::Id.is_in(linked))
        .order_by_asc(task::Column::CreatedAt)
        .into_tuple::<Uuid>()
        .all(conn)
        .await?)
}
