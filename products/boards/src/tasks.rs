//! Task factories and the per-field activity they produce.
//!
//! `update_task` writes at most one activity row per changed field group,
//! always in the same order: title, description, status, start date, end
//! date, then assignment changes (additions before removals, each sorted by
//! display name and id).

use std::collections::BTreeSet;

use chrono::Utc;
use entity::{SoftDelete, label, task, task_assignee, task_label, task_list, user};
use platform_api::ValidationErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Deserializer};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::{
    activity,
    actor::Actor,
    error::{BoardsError, BoardsResult},
    messages, permissions, validate, work_spaces,
};

pub const TITLE_MAX: usize = 300;
pub const LABEL_OFF_BOARD: &str = "Label does not belong to this board.";
pub const NOT_ASSIGNABLE: &str = "User is not a member of this work space.";
pub const LIST_OFF_BOARD: &str = "Task list does not belong to this board.";
pub const END_BEFORE_START: &str = "End date must not be before start date.";

#[derive(Clone, Debug, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub task_list_id: Uuid,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub start_date: Option<DateTimeWithTimeZone>,
    #[serde(default)]
    pub end_date: Option<DateTimeWithTimeZone>,
    #[serde(default)]
    pub labels: Vec<Uuid>,
    #[serde(default)]
    pub assignees: Vec<Uuid>,
}

/// Partial update. `None` keeps the stored value. The dates are nullable,
/// so `Some(None)` clears them while a missing key keeps them.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_list_id: Option<Uuid>,
    pub order: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<DateTimeWithTimeZone>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<DateTimeWithTimeZone>>,
    pub labels: Option<Vec<Uuid>>,
    pub assignees: Option<Vec<Uuid>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub async fn create_task<C>(db: &C, actor: &Actor, input: NewTask) -> BoardsResult<task::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.task.create", list = %input.task_list_id, actor = %actor.user_id);
    async move {
        let mut errors = ValidationErrors::new();
        let title = validate::title(&mut errors, "title", &input.title, TITLE_MAX);
        check_dates(&mut errors, input.start_date.as_ref(), input.end_date.as_ref());
        let list_exists = task_list::Entity::find_active_by_id(input.task_list_id)
            .count(db)
            .await?
            > 0;
        if !list_exists {
            errors.add("task_list", validate::DOES_NOT_EXIST);
            return Err(errors.into());
        }

        let (space, list) =
            permissions::ensure_task_list_access(db, actor, input.task_list_id).await?;
        let labels: BTreeSet<Uuid> = input.labels.into_iter().collect();
        let assignees: BTreeSet<Uuid> = input.assignees.into_iter().collect();
        check_labels(db, &mut errors, list.board_id, &labels).await?;
        let pool = work_spaces::assignable_user_ids(db, &space).await?;
        check_assignees(&mut errors, &pool, &assignees);
        errors.into_result()?;
        let title = title.unwrap_or_default();

        let order = match input.order {
            Some(order) => order,
            None => next_order(db, list.id).await?,
        };

        let txn = db.begin().await?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let created = task::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.clone()),
            description: Set(input.description),
            task_list_id: Set(list.id),
            order: Set(order),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        link_labels(&txn, created.id, &labels).await?;
        link_assignees(&txn, created.id, &assignees).await?;
        activity::record(
            &txn,
            created.id,
            actor.user_id,
            messages::task_created(&actor.display_name, &title),
        )
        .await;
        txn.commit().await?;
        info!(task = %created.id, "task created");
        Ok::<_, BoardsError>(created)
    }
    .instrument(span)
    .await
}

pub async fn update_task<C>(
    db: &C,
    actor: &Actor,
    task_id: Uuid,
    patch: TaskPatch,
) -> BoardsResult<task::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let span = info_span!("boards.task.update", task = %task_id, actor = %actor.user_id);
    async move {
        let scope = permissions::ensure_task_access(db, actor, task_id).await?;
        let current = scope.task.clone();
        let mut errors = ValidationErrors::new();

        let title = match &patch.title {
            Some(value) => validate::title(&mut errors, "title", value, TITLE_MAX),
            None => None,
        };

        let mut new_list: Option<task_list::Model> = None;
        if let Some(list_id) = patch.task_list_id.filter(|id| *id != current.task_list_id) {
            match task_list::Entity::find_active_by_id(list_id).one(db).await? {
                Some(list) if list.board_id == scope.board_id() => new_list = Some(list),
                Some(_) => errors.add("task_list", LIST_OFF_BOARD),
                None => errors.add("task_list", validate::DOES_NOT_EXIST),
            }
        }

        let start_date = patch.start_date.unwrap_or(current.start_date);
        let end_date = patch.end_date.unwrap_or(current.end_date);
        check_dates(&mut errors, start_date.as_ref(), end_date.as_ref());

        let labels: Option<BTreeSet<Uuid>> = patch.labels.map(|ids| ids.into_iter().collect());
        if let Some(labels) = &labels {
            check_labels(db, &mut errors, scope.board_id(), labels).await?;
        }
        let assignees: Option<BTreeSet<Uuid>> =
            patch.assignees.map(|ids| ids.into_iter().collect());
        if let Some(assignees) = &assignees {
            let pool = work_spaces::assignable_user_ids(db, &scope.work_space).await?;
            check_assignees(&mut errors, &pool, assignees);
        }
        errors.into_result()?;

        let mut log = Vec::new();
        let mut active: task::ActiveModel = current.clone().into();
        if let Some(title) = title.filter(|title| *title != current.title) {
            log.push(messages::title_changed(&title));
            active.title = Set(title);
        }
        if let Some(description) = patch.description.filter(|d| *d != current.description) {
            log.push(messages::description_changed());
            active.description = Set(description);
        }
        if let Some(list) = &new_list {
            log.push(messages::status_changed(&list.title));
            active.task_list_id = Set(list.id);
        }
        if start_date != current.start_date {
            log.push(messages::start_date_changed(start_date.as_ref()));
            active.start_date = Set(start_date);
        }
        if end_date != current.end_date {
            log.push(messages::end_date_changed(end_date.as_ref()));
            active.end_date = Set(end_date);
        }
        if let Some(order) = patch.order {
            active.order = Set(order);
        }

        let txn = db.begin().await?;
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        if let Some(desired) = &labels {
            let existing = label_ids(&txn, task_id).await?;
            let (added, removed) = diff_ids(&existing, desired);
            unlink_labels(&txn, task_id, &removed).await?;
            link_labels(&txn, task_id, &added.into_iter().collect()).await?;
        }
        if let Some(desired) = &assignees {
            let existing = assignee_ids(&txn, task_id).await?;
            let (added, removed) = diff_ids(&existing, desired);
            let added_names = display_names(&txn, &added).await?;
            let removed_names = display_names(&txn, &removed).await?;
            unlink_assignees(&txn, task_id, &removed).await?;
            link_assignees(&txn, task_id, &added.into_iter().collect()).await?;
            log.extend(assignment_messages(added_names, removed_names));
        }

        debug!(entries = log.len(), "task activity");
        activity::record_all(&txn, task_id, actor.user_id, log).await;
        txn.commit().await?;
        Ok::<_, BoardsError>(updated)
    }
    .instrument(span)
    .await
}

fn check_dates(
    errors: &mut ValidationErrors,
    start: Option<&DateTimeWithTimeZone>,
    end: Option<&DateTimeWithTimeZone>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.add("end_date", END_BEFORE_START);
        }
    }
}

async fn check_labels<C: ConnectionTrait>(
    conn: &C,
    errors: &mut ValidationErrors,
    board_id: Uuid,
    labels: &BTreeSet<Uuid>,
) -> BoardsResult<()> {
    if labels.is_empty() {
        return Ok(());
    }
    let found: Vec<(Uuid, Uuid)> = label::Entity::find()
        .select_only()
        .column(label::Column::Id)
        .column(label::Column::BoardId)
        .filter(label::Column::Id.is_in(labels.iter().copied()))
        .into_tuple()
        .all(conn)
        .await?;
    if found.len() < labels.len() {
        errors.add("labels", validate::DOES_NOT_EXIST);
    }
    if found.iter().any(|(_, board)| *board != board_id) {
        errors.add("labels", LABEL_OFF_BOARD);
    }
    Ok(())
}

fn check_assignees(errors: &mut ValidationErrors, pool: &BTreeSet<Uuid>, wanted: &BTreeSet<Uuid>) {
    if !wanted.is_subset(pool) {
        errors.add("assignees", NOT_ASSIGNABLE);
    }
}

async fn next_order<C: ConnectionTrait>(conn: &C, task_list_id: Uuid) -> BoardsResult<i32> {
    let count = task_count(conn, task_list_id).await?;
    i32::try_from(count + 1)
        .map_err(|_| BoardsError::validation("order", "Too many tasks in this list."))
}

/// Split `desired` against `existing` into (added, removed).
pub(crate) fn diff_ids(
    existing: &BTreeSet<Uuid>,
    desired: &BTreeSet<Uuid>,
) -> (Vec<Uuid>, Vec<Uuid>) {
    let added = desired.difference(existing).copied().collect();
    let removed = existing.difference(desired).copied().collect();
    (added, removed)
}

/// Assignment activity: additions first, then removals, each ordered by
/// display name and then id.
pub(crate) fn assignment_messages(
    mut added: Vec<(String, Uuid)>,
    mut removed: Vec<(String, Uuid)>,
) -> Vec<String> {
    added.sort();
    removed.sort();
    added
        .iter()
        .map(|(name, _)| messages::assigned(name))
        .chain(removed.iter().map(|(name, _)| messages::unassigned(name)))
        .collect()
}

async fn display_names<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> BoardsResult<Vec<(String, Uuid)>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    // Archived accounts can still be unassigned, so names come from every row.
    let users = user::Entity::find_original()
        .filter(user::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;
    Ok(users.iter().map(|u| (u.display_name(), u.id)).collect())
}

async fn label_ids<C: ConnectionTrait>(conn: &C, task_id: Uuid) -> BoardsResult<BTreeSet<Uuid>> {
    Ok(task_label::Entity::find()
        .select_only()
        .column(task_label::Column::LabelId)
        .filter(task_label::Column::TaskId.eq(task_id))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect())
}

async fn assignee_ids<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
) -> BoardsResult<BTreeSet<Uuid>> {
    Ok(task_assignee::Entity::find()
        .select_only()
        .column(task_assignee::Column::UserId)
        .filter(task_assignee::Column::TaskId.eq(task_id))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect())
}

pub(crate) async fn link_labels<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
    labels: &BTreeSet<Uuid>,
) -> BoardsResult<()> {
    if labels.is_empty() {
        return Ok(());
    }
    let rows = labels.iter().map(|label_id| task_label::ActiveModel {
        task_id: Set(task_id),
        label_id: Set(*label_id),
    });
    task_label::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

pub(crate) async fn unlink_labels<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
    labels: &[Uuid],
) -> BoardsResult<u64> {
    if labels.is_empty() {
        return Ok(0);
    }
    let result = task_label::Entity::delete_many()
        .filter(task_label::Column::TaskId.eq(task_id))
        .filter(task_label::Column::LabelId.is_in(labels.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

async fn link_assignees<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
    users: &BTreeSet<Uuid>,
) -> BoardsResult<()> {
    if users.is_empty() {
        return Ok(());
    }
    let rows = users.iter().map(|user_id| task_assignee::ActiveModel {
        task_id: Set(task_id),
        user_id: Set(*user_id),
    });
    task_assignee::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn unlink_assignees<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
    users: &[Uuid],
) -> BoardsResult<()> {
    if users.is_empty() {
        return Ok(());
    }
    task_assignee::Entity::delete_many()
        .filter(task_assignee::Column::TaskId.eq(task_id))
        .filter(task_assignee::Column::UserId.is_in(users.iter().copied()))
        .exec(conn)
        .await?;
    Ok(())
}

/// Active tasks in a list. Archived tasks do not count.
pub async fn task_count<C: ConnectionTrait>(conn: &C, task_list_id: Uuid) -> BoardsResult<u64> {
    Ok(task::Entity::find_active()
        .filter(task::Column::TaskListId.eq(task_list_id))
        .count(conn)
        .await?)
}

/// Active tasks of a list in display order.
pub async fn get_tasks<C: ConnectionTrait>(
    conn: &C,
    task_list_id: Uuid,
) -> BoardsResult<Vec<task::Model>> {
    Ok(task::Entity::find_active()
        .filter(task::Column::TaskListId.eq(task_list_id))
        .order_by_asc(task::Column::Order)
        .order_by_asc(task::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Active accounts assigned to a task.
pub async fn get_assigned_users<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
) -> BoardsResult<Vec<user::Model>> {
    let ids = assignee_ids(conn, task_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(user::Entity::find_active()
        .filter(user::Column::Id.is_in(ids))
        .order_by_asc(user::Column::FirstName)
        .order_by_asc(user::Column::LastName)
        .order_by_asc(user::Column::Id)
        .all(conn)
        .await?)
}

pub async fn get_task_labels<C: ConnectionTrait>(
    conn: &C,
    task_id: Uuid,
) -> BoardsResult<Vec<label::Model>> {
    let ids = label_ids(conn, task_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(label::Entity::find()
        .filter(label::Column::Id.is_in(ids))
        .order_by_asc(label::Column::Title)
        .all(conn)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn diff_splits_additions_and_removals() {
        let existing: BTreeSet<Uuid> = [id(1), id(2)].into();
        let desired: BTreeSet<Uuid> = [id(2), id(3)].into();
        let (added, removed) = diff_ids(&existing, &desired);
        assert_eq!(added, vec![id(3)]);
        assert_eq!(removed, vec![id(1)]);
    }

    #[test]
    fn unchanged_sets_produce_no_diff() {
        let same: BTreeSet<Uuid> = [id(1), id(2)].into();
        let (added, removed) = diff_ids(&same, &same);
        assert!(added.is_empty() && removed.is_empty());
    }

    #[test]
    fn assignment_messages_add_before_remove_sorted_by_name() {
        let messages = assignment_messages(
            vec![("Zed".into(), id(1)), ("Amir".into(), id(2))],
            vec![("Bita".into(), id(4)), ("Bita".into(), id(3))],
        );
        assert_eq!(
            messages,
            vec![
                "Task assined to Amir.",
                "Task assined to Zed.",
                "Bita removed from task assigness.",
                "Bita removed from task assigness.",
            ]
        );
    }

    #[test]
    fn patch_distinguishes_missing_from_null_dates() {
        let keep: TaskPatch = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(keep.start_date, None);

        let clear: TaskPatch = serde_json::from_str(r#"{"start_date":null}"#).unwrap();
        assert_eq!(clear.start_date, Some(None));

        let set: TaskPatch =
            serde_json::from_str(r#"{"end_date":"2025-03-01T10:00:00+00:00"}"#).unwrap();
        assert!(matches!(set.end_date, Some(Some(_))));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let start: DateTimeWithTimeZone = "2025-03-02T00:00:00+00:00".parse().unwrap();
        let end: DateTimeWithTimeZone = "2025-03-01T00:00:00+00:00".parse().unwrap();
        let mut errors = ValidationErrors::new();
        check_dates(&mut errors, Some(&start), Some(&end));
        assert!(errors.contains("end_date"));

        let mut errors = ValidationErrors::new();
        check_dates(&mut errors, Some(&start), None);
        assert!(errors.is_empty());
    }
}
