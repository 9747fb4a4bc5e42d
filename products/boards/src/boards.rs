use chrono::Utc;
use entity::{SoftDelete, board, task_list, work_space};
use platform_api::ValidationErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    PaginatorTrait, QueryFilter, QueryOrder, prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    actor::Actor,
    error::{BoardsError, BoardsResult},
    permissions, validate,
};

pub const TITLE_MAX: usize = 150;

#[derive(Clone, Debug, Deserialize)]
pub struct NewBoard {
    pub title: String,
    pub work_space_id: Uuid,
    #[serde(default)]
    pub background_image: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BoardPatch {
    pub title: Option<String>,
    pub background_image: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTaskList {
    pub title: String,
    pub board_id: Uuid,
    /// Appended after the existing active lists when omitted.
    #[serde(default)]
    pub order: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskListPatch {
    pub title: Option<String>,
    pub order: Option<i32>,
}

pub async fn create_board<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    input: NewBoard,
) -> BoardsResult<board::Model> {
    let mut errors = ValidationErrors::new();
    let title = validate::title(&mut errors, "title", &input.title, TITLE_MAX);
    let space_exists = work_space::Entity::find_active_by_id(input.work_space_id)
        .count(conn)
        .await?
        > 0;
    if !space_exists {
        errors.add("work_space", validate::DOES_NOT_EXIST);
    }
    errors.into_result()?;
    permissions::ensure_work_space_access(conn, actor, input.work_space_id).await?;

    let background = input
        .background_image
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| board::DEFAULT_BACKGROUND.to_string());
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = board::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.unwrap_or_default()),
        background_image: Set(background),
        work_space_id: Set(input.work_space_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    info!(board = %created.id, work_space = %created.work_space_id, "board created");
    Ok(created)
}

pub async fn update_board<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    board_id: Uuid,
    patch: BoardPatch,
) -> BoardsResult<board::Model> {
    let (_, board) = permissions::ensure_board_access(conn, actor, board_id).await?;
    let mut errors = ValidationErrors::new();
    let title = match &patch.title {
        Some(value) => validate::title(&mut errors, "title", value, TITLE_MAX),
        None => None,
    };
    errors.into_result()?;

    let mut active: board::ActiveModel = board.into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(path) = patch.background_image {
        active.background_image = Set(if path.trim().is_empty() {
            board::DEFAULT_BACKGROUND.to_string()
        } else {
            path
        });
    }
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

pub async fn create_task_list<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    input: NewTaskList,
) -> BoardsResult<task_list::Model> {
    let mut errors = ValidationErrors::new();
    let title = validate::title(&mut errors, "title", &input.title, TITLE_MAX);
    let board_exists = board::Entity::find_active_by_id(input.board_id)
        .count(conn)
        .await?
        > 0;
    if !board_exists {
        errors.add("board", validate::DOES_NOT_EXIST);
    }
    errors.into_result()?;
    permissions::ensure_board_access(conn, actor, input.board_id).await?;

    let order = match input.order {
        Some(order) => order,
        None => list_count(conn, input.board_id).await? + 1,
    };
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = task_list::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.unwrap_or_default()),
        order: Set(order),
        board_id: Set(input.board_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(created)
}

pub async fn update_task_list<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    task_list_id: Uuid,
    patch: TaskListPatch,
) -> BoardsResult<task_list::Model> {
    let (_, list) = permissions::ensure_task_list_access(conn, actor, task_list_id).await?;
    let mut errors = ValidationErrors::new();
    let title = match &patch.title {
        Some(value) => validate::title(&mut errors, "title", value, TITLE_MAX),
        None => None,
    };
    errors.into_result()?;

    let mut active: task_list::ActiveModel = list.into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(order) = patch.order {
        active.order = Set(order);
    }
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

async fn list_count<C: ConnectionTrait>(conn: &C, board_id: Uuid) -> BoardsResult<i32> {
    let count = task_list::Entity::find_active()
        .filter(task_list::Column::BoardId.eq(board_id))
        .count(conn)
        .await?;
    i32::try_from(count)
        .map_err(|_| BoardsError::validation("order", "Too many lists on this board."))
}

/// Active lists of a board in display order.
pub async fn get_task_lists<C: ConnectionTrait>(
    conn: &C,
    board_id: Uuid,
) -> BoardsResult<Vec<task_list::Model>> {
    Ok(task_list::Entity::find_active()
        .filter(task_list::Column::BoardId.eq(board_id))
        .order_by_asc(task_list::Column::Order)
        .order_by_asc(task_list::Column::CreatedAt)
        .all(conn)
        .await?)
}
