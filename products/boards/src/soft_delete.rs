//! Cascading archive and restore.
//!
//! Archiving never removes rows: it clears `is_active` on the addressed
//! record and everything below it. Descendants are always resolved through
//! the original accessor so rows that were archived on their own are still
//! part of the subtree. Flags flip bottom-up (tasks, task lists, boards,
//! work space) inside a single transaction, and restore walks the same
//! subtree in the same order.

use std::{fmt, str::FromStr};

use chrono::Utc;
use entity::{
    SoftDelete, attachment, board, comment, task, task_list, user, work_space,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, QueryFilter, QuerySelect, QueryTrait, TransactionTrait,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, SelectStatement, SimpleExpr},
};
use serde::Serialize;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    activity,
    actor::Actor,
    error::{BoardsError, BoardsResult},
    messages,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    User,
    WorkSpace,
    Board,
    TaskList,
    Task,
}

impl TargetKind {
    pub const ALL: [TargetKind; 5] = [
        TargetKind::User,
        TargetKind::WorkSpace,
        TargetKind::Board,
        TargetKind::TaskList,
        TargetKind::Task,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::User => "user",
            TargetKind::WorkSpace => "work_space",
            TargetKind::Board => "board",
            TargetKind::TaskList => "task_list",
            TargetKind::Task => "task",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown target kind `{0}`")]
pub struct UnknownTargetKind(pub String);

impl FromStr for TargetKind {
    type Err = UnknownTargetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.as_str().replace('_', "") == normalized)
            .ok_or_else(|| UnknownTargetKind(s.to_string()))
    }
}

/// A record that owns a cascade.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Target {
    User(Uuid),
    WorkSpace(Uuid),
    Board(Uuid),
    TaskList(Uuid),
    Task(Uuid),
}

impl Target {
    pub fn new(kind: TargetKind, id: Uuid) -> Self {
        match kind {
            TargetKind::User => Target::User(id),
            TargetKind::WorkSpace => Target::WorkSpace(id),
            TargetKind::Board => Target::Board(id),
            TargetKind::TaskList => Target::TaskList(id),
            TargetKind::Task => Target::Task(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::User(_) => TargetKind::User,
            Target::WorkSpace(_) => TargetKind::WorkSpace,
            Target::Board(_) => TargetKind::Board,
            Target::TaskList(_) => TargetKind::TaskList,
            Target::Task(_) => TargetKind::Task,
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            Target::User(id)
            | Target::WorkSpace(id)
            | Target::Board(id)
            | Target::TaskList(id)
            | Target::Task(id) => id,
        }
    }
}

/// Rows whose flag actually flipped, per level.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CascadeSummary {
    pub users: u64,
    pub work_spaces: u64,
    pub boards: u64,
    pub task_lists: u64,
    pub tasks: u64,
}

impl CascadeSummary {
    pub fn total(&self) -> u64 {
        self.users + self.work_spaces + self.boards + self.task_lists + self.tasks
    }
}

impl fmt::Display for CascadeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} work_spaces={} boards={} task_lists={} tasks={}",
            self.users, self.work_spaces, self.boards, self.task_lists, self.tasks
        )
    }
}

/// Filters selecting a cascade root and every row beneath it, regardless of
/// state. Each level is chained to its parent through a subquery so the
/// statements never bind one parameter per descendant.
#[derive(Debug, Default)]
struct Subtree {
    work_spaces: Option<SimpleExpr>,
    boards: Option<SimpleExpr>,
    task_lists: Option<SimpleExpr>,
    tasks: Option<SimpleExpr>,
}

impl Subtree {
    async fn resolve<C: ConnectionTrait>(conn: &C, target: Target) -> BoardsResult<Self> {
        let mut tree = Subtree::default();
        match target {
            Target::User(_) => return Ok(tree),
            Target::WorkSpace(id) => {
                ensure_exists::<work_space::Entity, _>(conn, id, "work_space").await?;
                tree.work_spaces = Some(work_space::Column::Id.eq(id));
                tree.boards = Some(board::Column::WorkSpaceId.eq(id));
            }
            Target::Board(id) => {
                ensure_exists::<board::Entity, _>(conn, id, "board").await?;
                tree.boards = Some(board::Column::Id.eq(id));
            }
            Target::TaskList(id) => {
                ensure_exists::<task_list::Entity, _>(conn, id, "task_list").await?;
                tree.task_lists = Some(task_list::Column::Id.eq(id));
            }
            Target::Task(id) => {
                ensure_exists::<task::Entity, _>(conn, id, "task").await?;
                tree.tasks = Some(task::Column::Id.eq(id));
                return Ok(tree);
            }
        }
        if let Some(boards) = &tree.boards {
            tree.task_lists = Some(
                task_list::Column::BoardId.in_subquery(ids_where::<board::Entity>(boards.clone())),
            );
        }
        if let Some(lists) = &tree.task_lists {
            tree.tasks = Some(
                task::Column::TaskListId.in_subquery(ids_where::<task_list::Entity>(lists.clone())),
            );
        }
        Ok(tree)
    }
}

async fn ensure_exists<E, C>(conn: &C, id: Uuid, entity: &'static str) -> BoardsResult<()>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    let found = E::find_original_by_id(id)
        .select_only()
        .column(E::id_column())
        .into_tuple::<Uuid>()
        .one(conn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(BoardsError::not_found(entity, id)),
    }
}

/// `SELECT id FROM <E> WHERE <filter>`, archived rows included.
fn ids_where<E: SoftDelete>(filter: SimpleExpr) -> SelectStatement {
    E::find_original()
        .select_only()
        .column(E::id_column())
        .filter(filter)
        .into_query()
}

/// Flip the flag on rows matching `filter`, touching only rows not already
/// in that state.
async fn set_active<E, C>(
    conn: &C,
    filter: SimpleExpr,
    active: bool,
    now: DateTimeWithTimeZone,
) -> Result<u64, DbErr>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    let result = E::update_many()
        .col_expr(E::active_column(), Expr::value(active))
        .col_expr(E::updated_at_column(), Expr::value(now))
        .filter(filter)
        .filter(E::active_column().ne(active))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn set_level<E, C>(
    conn: &C,
    filter: Option<SimpleExpr>,
    active: bool,
    now: DateTimeWithTimeZone,
) -> Result<u64, DbErr>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    match filter {
        Some(filter) => set_active::<E, _>(conn, filter, active, now).await,
        None => Ok(0),
    }
}

async fn apply<C>(db: &C, target: Target, active: bool) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let mut summary = CascadeSummary::default();
    let now: DateTimeWithTimeZone = Utc::now().into();

    if let Target::User(id) = target {
        ensure_exists::<user::Entity, _>(&txn, id, "user").await?;
        summary.users =
            set_active::<user::Entity, _>(&txn, user::Column::Id.eq(id), active, now).await?;
    } else {
        let tree = Subtree::resolve(&txn, target).await?;
        summary.tasks = set_level::<task::Entity, _>(&txn, tree.tasks, active, now).await?;
        summary.task_lists =
            set_level::<task_list::Entity, _>(&txn, tree.task_lists, active, now).await?;
        summary.boards = set_level::<board::Entity, _>(&txn, tree.boards, active, now).await?;
        summary.work_spaces =
            set_level::<work_space::Entity, _>(&txn, tree.work_spaces, active, now).await?;
    }

    txn.commit().await?;
    info!(%summary, "cascade applied");
    Ok(summary)
}

/// Archive `target` and everything beneath it.
pub async fn archive<C>(db: &C, target: Target) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.archive", kind = %target.kind(), id = %target.id());
    apply(db, target, false).instrument(span).await
}

/// Restore `target` and everything beneath it, including descendants that
/// were archived independently before.
pub async fn restore<C>(db: &C, target: Target) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.restore", kind = %target.kind(), id = %target.id());
    apply(db, target, true).instrument(span).await
}

pub async fn archive_user<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    archive(db, Target::User(id)).await
}

pub async fn restore_user<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    restore(db, Target::User(id)).await
}

pub async fn archive_work_space<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    archive(db, Target::WorkSpace(id)).await
}

pub async fn restore_work_space<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    restore(db, Target::WorkSpace(id)).await
}

pub async fn archive_board<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    archive(db, Target::Board(id)).await
}

pub async fn restore_board<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    restore(db, Target::Board(id)).await
}

pub async fn archive_task_list<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    archive(db, Target::TaskList(id)).await
}

pub async fn restore_task_list<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    restore(db, Target::TaskList(id)).await
}

pub async fn archive_task<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    archive(db, Target::Task(id)).await
}

pub async fn restore_task<C>(db: &C, id: Uuid) -> BoardsResult<CascadeSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    restore(db, Target::Task(id)).await
}

/// Archive a comment and log who did it. Archiving a comment that is
/// already inactive changes nothing and logs nothing.
pub async fn archive_comment<C>(db: &C, actor: &Actor, id: Uuid) -> BoardsResult<comment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.archive_comment", %id, actor = %actor.user_id);
    async move {
        let txn = db.begin().await?;
        let found = comment::Entity::find_original_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| BoardsError::not_found("comment", id))?;
        let flipped = set_active::<comment::Entity, _>(
            &txn,
            comment::Column::Id.eq(id),
            false,
            Utc::now().into(),
        )
        .await?;
        if flipped > 0 {
            activity::record(
                &txn,
                found.task_id,
                actor.user_id,
                messages::comment_deleted(&actor.display_name),
            )
            .await;
        }
        let archived = reload::<comment::Entity, _>(&txn, id, "comment").await?;
        txn.commit().await?;
        Ok::<_, BoardsError>(archived)
    }
    .instrument(span)
    .await
}

pub async fn restore_comment<C>(db: &C, id: Uuid) -> BoardsResult<comment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    ensure_exists::<comment::Entity, _>(&txn, id, "comment").await?;
    set_active::<comment::Entity, _>(&txn, comment::Column::Id.eq(id), true, Utc::now().into())
        .await?;
    let restored = reload::<comment::Entity, _>(&txn, id, "comment").await?;
    txn.commit().await?;
    Ok(restored)
}

/// Archive an attachment and log who did it. Repeating the archive logs
/// nothing.
pub async fn archive_attachment<C>(
    db: &C,
    actor: &Actor,
    id: Uuid,
) -> BoardsResult<attachment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.archive_attachment", %id, actor = %actor.user_id);
    async move {
        let txn = db.begin().await?;
        let found = attachment::Entity::find_original_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| BoardsError::not_found("attachment", id))?;
        let flipped = set_active::<attachment::Entity, _>(
            &txn,
            attachment::Column::Id.eq(id),
            false,
            Utc::now().into(),
        )
        .await?;
        if flipped > 0 {
            activity::record(
                &txn,
                found.task_id,
                actor.user_id,
                messages::attachment_deleted(&actor.display_name),
            )
            .await;
        }
        let archived = reload::<attachment::Entity, _>(&txn, id, "attachment").await?;
        txn.commit().await?;
        Ok::<_, BoardsError>(archived)
    }
    .instrument(span)
    .await
}

pub async fn restore_attachment<C>(db: &C, id: Uuid) -> BoardsResult<attachment::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    ensure_exists::<attachment::Entity, _>(&txn, id, "attachment").await?;
    set_active::<attachment::Entity, _>(
        &txn,
        attachment::Column::Id.eq(id),
        true,
        Utc::now().into(),
    ).await?;
    let restored = reload::<attachment::Entity, _>(&txn, id, "attachment").await?;
    txn.commit().await?;
    Ok(restored)
}

async fn reload<E, C>(conn: &C, id: Uuid, entity: &'static str) -> BoardsResult<E::Model>
where
    E: SoftDelete,
    C: ConnectionTrait,
{
    E::find_original_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found(entity, id))
}
