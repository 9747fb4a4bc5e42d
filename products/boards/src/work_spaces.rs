use std::collections::BTreeSet;

use chrono::Utc;
use entity::{SoftDelete, board, user, work_space, work_space_member};
use platform_api::ValidationErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    actor::Actor,
    error::{BoardsError, BoardsResult},
    permissions, validate,
};

pub const TITLE_MAX: usize = 150;
pub const OWNER_IS_MEMBER: &str = "Owner cant be member";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewWorkSpace {
    pub title: String,
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// Create a work space owned by `actor`.
pub async fn create_work_space<C>(
    db: &C,
    actor: &Actor,
    input: NewWorkSpace,
) -> BoardsResult<work_space::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.work_space.create", owner = %actor.user_id);
    async move {
        let mut errors = ValidationErrors::new();
        let title = validate::title(&mut errors, "title", &input.title, TITLE_MAX);
        let members: BTreeSet<Uuid> = input.members.into_iter().collect();
        if members.contains(&actor.user_id) {
            errors.add("members", OWNER_IS_MEMBER);
        }
        let missing = missing_users(db, &members).await?;
        if !missing.is_empty() {
            errors.add("members", validate::DOES_NOT_EXIST);
        }
        errors.into_result()?;
        let title = title.unwrap_or_default();

        let txn = db.begin().await?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let created = work_space::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            owner_id: Set(actor.user_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        for member in &members {
            insert_member(&txn, created.id, *member, now).await?;
        }
        txn.commit().await?;
        info!(work_space = %created.id, members = members.len(), "work space created");
        Ok::<_, BoardsError>(created)
    }
    .instrument(span)
    .await
}

/// Rename a work space.
pub async fn rename_work_space<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    work_space_id: Uuid,
    title: &str,
) -> BoardsResult<work_space::Model> {
    let space = permissions::ensure_work_space_access(conn, actor, work_space_id).await?;
    let mut errors = ValidationErrors::new();
    let title = validate::title(&mut errors, "title", title, TITLE_MAX);
    errors.into_result()?;
    let mut active: work_space::ActiveModel = space.into();
    active.title = Set(title.unwrap_or_default());
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

/// Add `user_id` to the members. Only the owner (or staff) manages
/// membership. Adding an existing member is a no-op.
pub async fn add_member<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    work_space_id: Uuid,
    user_id: Uuid,
) -> BoardsResult<work_space_member::Model> {
    let space = owner_access(conn, actor, work_space_id).await?;
    if space.owner_id == user_id {
        return Err(BoardsError::validation("user", OWNER_IS_MEMBER));
    }
    if user::Entity::find_active_by_id(user_id).one(conn).await?.is_none() {
        return Err(BoardsError::validation("user", validate::DOES_NOT_EXIST));
    }
    if let Some(existing) = work_space_member::Entity::find_by_id((space.id, user_id))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    insert_member(conn, space.id, user_id, now).await?;
    Ok(work_space_member::Model {
        work_space_id: space.id,
        user_id,
        created_at: now,
    })
}

/// Remove a member. Returns whether a membership row was deleted.
pub async fn remove_member<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    work_space_id: Uuid,
    user_id: Uuid,
) -> BoardsResult<bool> {
    let space = owner_access(conn, actor, work_space_id).await?;
    match work_space_member::Entity::find_by_id((space.id, user_id))
        .one(conn)
        .await?
    {
        Some(row) => {
            row.delete(conn).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn owner_access<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    work_space_id: Uuid,
) -> BoardsResult<work_space::Model> {
    let space = permissions::ensure_work_space_access(conn, actor, work_space_id).await?;
    if space.owner_id == actor.user_id || actor.is_staff {
        Ok(space)
    } else {
        Err(BoardsError::Forbidden)
    }
}

async fn insert_member<C: ConnectionTrait>(
    conn: &C,
    work_space_id: Uuid,
    user_id: Uuid,
    now: DateTimeWithTimeZone,
) -> BoardsResult<()> {
    work_space_member::Entity::insert(work_space_member::ActiveModel {
        work_space_id: Set(work_space_id),
        user_id: Set(user_id),
        created_at: Set(now),
    })
    .exec_without_returning(conn)
    .await?;
    Ok(())
}

async fn missing_users<C: ConnectionTrait>(
    conn: &C,
    ids: &BTreeSet<Uuid>,
) -> BoardsResult<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: BTreeSet<Uuid> = user::Entity::find_active()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::Id.is_in(ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    Ok(ids.difference(&found).copied().collect())
}

/// Reject a work space whose owner is also listed as a member. Rows added
/// through the admin path bypass the factory checks, so anything deriving
/// access from membership runs this first.
pub async fn validate_work_space<C: ConnectionTrait>(
    conn: &C,
    space: &work_space::Model,
) -> BoardsResult<()> {
    let owner_listed = work_space_member::Entity::find()
        .filter(work_space_member::Column::WorkSpaceId.eq(space.id))
        .filter(work_space_member::Column::UserId.eq(space.owner_id))
        .count(conn)
        .await?;
    if owner_listed > 0 {
        return Err(BoardsError::validation("members", OWNER_IS_MEMBER));
    }
    Ok(())
}

pub async fn is_member<C: ConnectionTrait>(
    conn: &C,
    work_space_id: Uuid,
    user_id: Uuid,
) -> BoardsResult<bool> {
    let rows = work_space_member::Entity::find_by_id((work_space_id, user_id))
        .count(conn)
        .await?;
    Ok(rows > 0)
}

async fn member_ids<C: ConnectionTrait>(conn: &C, work_space_id: Uuid) -> BoardsResult<Vec<Uuid>> {
    Ok(work_space_member::Entity::find()
        .select_only()
        .column(work_space_member::Column::UserId)
        .filter(work_space_member::Column::WorkSpaceId.eq(work_space_id))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?)
}

/// Active member accounts, owner excluded.
pub async fn work_space_members<C: ConnectionTrait>(
    conn: &C,
    work_space_id: Uuid,
) -> BoardsResult<Vec<user::Model>> {
    let ids = member_ids(conn, work_space_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(user::Entity::find_active()
        .filter(user::Column::Id.is_in(ids))
        .order_by_asc(user::Column::Email)
        .all(conn)
        .await?)
}

/// Ids of active accounts a task in this work space may be assigned to:
/// the owner plus every member.
pub async fn assignable_user_ids<C: ConnectionTrait>(
    conn: &C,
    space: &work_space::Model,
) -> BoardsResult<BTreeSet<Uuid>> {
    let mut candidates = member_ids(conn, space.id).await?;
    candidates.push(space.owner_id);
    Ok(user::Entity::find_active()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::Id.is_in(candidates))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect())
}

/// Active boards of a work space, oldest first.
pub async fn get_boards<C: ConnectionTrait>(
    conn: &C,
    work_space_id: Uuid,
) -> BoardsResult<Vec<board::Model>> {
    Ok(board::Entity::find_active()
        .filter(board::Column::WorkSpaceId.eq(work_space_id))
        .order_by_asc(board::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Work spaces whose owner is also stored as a member, with the offending
/// owner id. Used by the admin consistency check.
pub async fn owner_member_conflicts<C: ConnectionTrait>(
    conn: &C,
) -> BoardsResult<Vec<(work_space::Model, Uuid)>> {
    let spaces = work_space::Entity::find_original()
        .order_by_asc(work_space::Column::CreatedAt)
        .all(conn)
        .await?;
    let mut conflicts = Vec::new();
    for space in spaces {
        match validate_work_space(conn, &space).await {
            Ok(()) => {}
            Err(BoardsError::Validation(_)) => {
                let owner = space.owner_id;
                conflicts.push((space, owner));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(conflicts)
}
