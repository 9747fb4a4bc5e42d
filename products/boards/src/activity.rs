//! Append-only audit log attached to tasks.
//!
//! Writes are best-effort: each row goes through its own savepoint, and a
//! failed write is rolled back and logged instead of failing the mutation
//! that triggered it.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use entity::{SoftDelete, activity, task, task_list};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait, TransactionTrait,
    prelude::DateTimeWithTimeZone, sea_query::SelectStatement,
};
use tracing::warn;
use uuid::Uuid;

use crate::messages;

/// Hands out strictly increasing microsecond timestamps. One clock is
/// shared by every writer in the process, so entries sort in the order they
/// were produced even when two calls land in the same microsecond.
#[derive(Debug)]
pub struct Clock {
    last_micros: AtomicI64,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(i64::MIN),
        }
    }

    pub fn tick(&self) -> DateTimeWithTimeZone {
        self.tick_from(Utc::now())
    }

    /// `now` truncated to microseconds (Postgres keeps no more), moved past
    /// the previous tick when the wall clock has not advanced.
    pub fn tick_from(&self, now: DateTime<Utc>) -> DateTimeWithTimeZone {
        let wanted = now.timestamp_micros();
        let previous = self
            .last_micros
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(wanted.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        let micros = wanted.max(previous.saturating_add(1));
        DateTime::<Utc>::from_timestamp_micros(micros)
            .unwrap_or(now)
            .into()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

static CLOCK: Clock = Clock::new();

/// Next timestamp from the process-wide activity clock.
pub fn next_timestamp() -> DateTimeWithTimeZone {
    CLOCK.tick()
}

/// Insert one row inside a savepoint, surfacing the store error.
pub async fn try_record<C>(
    conn: &C,
    task_id: Uuid,
    doer_id: Uuid,
    message: String,
    at: DateTimeWithTimeZone,
) -> Result<activity::Model, DbErr>
where
    C: TransactionTrait,
{
    let savepoint = conn.begin().await?;
    let inserted = activity::ActiveModel {
        id: Set(Uuid::now_v7()),
        message: Set(message),
        doer_id: Set(doer_id),
        task_id: Set(task_id),
        created_at: Set(at),
        updated_at: Set(at),
    }
    .insert(&savepoint)
    .await;
    match inserted {
        Ok(model) => {
            savepoint.commit().await?;
            Ok(model)
        }
        Err(err) => {
            savepoint.rollback().await?;
            Err(err)
        }
    }
}

/// Append one entry. Returns `None` when the write failed; the failure is
/// logged and otherwise swallowed.
pub async fn record<C>(
    conn: &C,
    task_id: Uuid,
    doer_id: Uuid,
    message: impl Into<String>,
) -> Option<activity::Model>
where
    C: TransactionTrait,
{
    record_at(conn, task_id, doer_id, message.into(), next_timestamp()).await
}

/// Append several entries in order, one row per message.
pub async fn record_all<C>(
    conn: &C,
    task_id: Uuid,
    doer_id: Uuid,
    messages: Vec<String>,
) -> Vec<activity::Model>
where
    C: TransactionTrait,
{
    let mut written = Vec::with_capacity(messages.len());
    for message in messages {
        if let Some(row) = record_at(conn, task_id, doer_id, message, next_timestamp()).await {
            written.push(row);
        }
    }
    written
}

async fn record_at<C>(
    conn: &C,
    task_id: Uuid,
    doer_id: Uuid,
    message: String,
    at: DateTimeWithTimeZone,
) -> Option<activity::Model>
where
    C: TransactionTrait,
{
    match try_record(conn, task_id, doer_id, message, at).await {
        Ok(row) => Some(row),
        Err(err) => {
            warn!(%task_id, %doer_id, error = %err, "activity write failed; continuing");
            None
        }
    }
}

/// Full history of a task, oldest first. Archived tasks keep their history.
pub async fn get_activity<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
) -> Result<Vec<activity::Model>, DbErr> {
    activity::Entity::find()
        .filter(activity::Column::TaskId.eq(task_id))
        .order_by_asc(activity::Column::CreatedAt)
        .order_by_asc(activity::Column::Id)
        .all(conn)
        .await
}

/// Everything one user did on one task, oldest first.
pub async fn get_activity_by_doer<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
    doer_id: Uuid,
) -> Result<Vec<activity::Model>, DbErr> {
    activity::Entity::find()
        .filter(activity::Column::TaskId.eq(task_id))
        .filter(activity::Column::DoerId.eq(doer_id))
        .order_by_asc(activity::Column::CreatedAt)
        .order_by_asc(activity::Column::Id)
        .all(conn)
        .await
}

/// Activity in a closed time window across all tasks.
pub async fn between<C: ConnectionTrait>(
    conn: &C,
    from: DateTimeWithTimeZone,
    to: DateTimeWithTimeZone,
) -> Result<Vec<activity::Model>, DbErr> {
    activity::Entity::find()
        .filter(activity::Column::CreatedAt.between(from, to))
        .order_by_asc(activity::Column::CreatedAt)
        .order_by_asc(activity::Column::Id)
        .all(conn)
        .await
}

/// "attached a new file" entries on every task of a board, oldest first.
pub async fn attachment_activity_in_board<C: ConnectionTrait>(
    conn: &C,
    board_id: Uuid,
) -> Result<Vec<activity::Model>, DbErr> {
    board_activity_like(conn, board_id, messages::ATTACHMENT_CREATED_LIKE).await
}

/// Task creation entries on every task of a board, oldest first.
pub async fn task_create_activity_in_board<C: ConnectionTrait>(
    conn: &C,
    board_id: Uuid,
) -> Result<Vec<activity::Model>, DbErr> {
    board_activity_like(conn, board_id, messages::TASK_CREATED_LIKE).await
}

/// Board-wide entries whose message matches `pattern`, taken from tasks in
/// any state like the per-task history.
async fn board_activity_like<C: ConnectionTrait>(
    conn: &C,
    board_id: Uuid,
    pattern: &str,
) -> Result<Vec<activity::Model>, DbErr> {
    activity::Entity::find()
        .filter(activity::Column::TaskId.in_subquery(board_task_ids(board_id)))
        .filter(activity::Column::Message.like(pattern))
        .order_by_asc(activity::Column::CreatedAt)
        .order_by_asc(activity::Column::Id)
        .all(conn)
        .await
}

/// `SELECT id FROM task` for every task of a board, archived lists and tasks
/// included.
pub(crate) fn board_task_ids(board_id: Uuid) -> SelectStatement {
    let lists = task_list::Entity::find_original()
        .select_only()
        .column(task_list::Column::Id)
        .filter(task_list::Column::BoardId.eq(board_id))
        .into_query();
    task::Entity::find_original()
        .select_only()
        .column(task::Column::Id)
        .filter(task::Column::TaskListId.in_subquery(lists))
        .into_query()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ticks_at_the_same_instant_still_increase() {
        let clock = Clock::new();
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let first = clock.tick_from(at);
        let second = clock.tick_from(at);
        let third = clock.tick_from(at);
        assert!(first < second && second < third);
        assert_eq!(second - first, Duration::microseconds(1));
    }

    #[test]
    fn a_clock_stepping_back_does_not_reorder_ticks() {
        let clock = Clock::new();
        let later = DateTime::<Utc>::from_timestamp(1_700_000_060, 0).unwrap();
        let earlier = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let first = clock.tick_from(later);
        let second = clock.tick_from(earlier);
        assert!(second > first);
    }

    #[test]
    fn ticks_drop_sub_microsecond_precision() {
        let clock = Clock::new();
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(clock.tick_from(at).timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn concurrent_writers_never_share_a_tick() {
        let clock = Clock::new();
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let mut ticks: Vec<_> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| (0..250).map(|_| clock.tick_from(at)).collect::<Vec<_>>()))
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });
        ticks.sort();
        ticks.dedup();
        assert_eq!(ticks.len(), 1_000);
    }
}
