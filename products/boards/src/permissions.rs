//! Membership-derived authorization.
//!
//! Access to anything under a work space is granted to its owner, its
//! members and staff accounts. Owner/member exclusivity is checked first:
//! a work space whose owner also shows up as a member is rejected rather
//! than silently authorized twice.

use entity::{SoftDelete, board, task, task_list, work_space};
use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::{
    actor::Actor,
    error::{BoardsError, BoardsResult},
    work_spaces,
};

/// Load an active work space and check that `actor` may work in it.
pub async fn ensure_work_space_access<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    work_space_id: Uuid,
) -> BoardsResult<work_space::Model> {
    let space = work_space::Entity::find_active_by_id(work_space_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("work_space", work_space_id))?;
    work_spaces::validate_work_space(conn, &space).await?;

    if actor.is_staff || space.owner_id == actor.user_id {
        return Ok(space);
    }
    if work_spaces::is_member(conn, space.id, actor.user_id).await? {
        return Ok(space);
    }
    tracing::debug!(work_space = %space.id, actor = %actor.user_id, "access denied");
    Err(BoardsError::Forbidden)
}

pub async fn ensure_board_access<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    board_id: Uuid,
) -> BoardsResult<(work_space::Model, board::Model)> {
    let board = board::Entity::find_active_by_id(board_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("board", board_id))?;
    let space = ensure_work_space_access(conn, actor, board.work_space_id).await?;
    Ok((space, board))
}

pub async fn ensure_task_list_access<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    task_list_id: Uuid,
) -> BoardsResult<(work_space::Model, task_list::Model)> {
    let list = task_list::Entity::find_active_by_id(task_list_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("task_list", task_list_id))?;
    let (space, _) = ensure_board_access(conn, actor, list.board_id).await?;
    Ok((space, list))
}

/// Resolve an active task up to its work space and check access there.
pub async fn ensure_task_access<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    task_id: Uuid,
) -> BoardsResult<TaskScope> {
    let task = task::Entity::find_active_by_id(task_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("task", task_id))?;
    let (work_space, task_list) = ensure_task_list_access(conn, actor, task.task_list_id).await?;
    Ok(TaskScope {
        work_space,
        task_list,
        task,
    })
}

/// A task together with the containers that authorized access to it.
#[derive(Clone, Debug)]
pub struct TaskScope {
    pub work_space: work_space::Model,
    pub task_list: task_list::Model,
    pub task: task::Model,
}

impl TaskScope {
    pub fn board_id(&self) -> Uuid {
        self.task_list.board_id
    }
}
