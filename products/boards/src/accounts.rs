//! User accounts: registration, credentials and the per-user views of work
//! spaces, tasks and activity.

use std::collections::BTreeSet;

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use chrono::Utc;
use entity::{
    SoftDelete, activity, board, task, task_assignee, task_list, user, work_space,
    work_space_member,
};
use platform_api::{NON_FIELD_ERRORS, ValidationErrors};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    prelude::DateTimeWithTimeZone,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{BoardsError, BoardsResult},
    work_spaces,
};

pub const DEFAULT_AVATAR: &str = "uploads/avatars/default.jpg";
pub const MOBILE_MAX: usize = 11;
pub const PASSWORD_MIN: usize = 8;
pub const EMAIL_TAKEN: &str = "A user with that email already exists.";
pub const MOBILE_TAKEN: &str = "A user with that mobile number already exists.";
pub const PASSWORDS_DIFFER: &str = "Passwords does not match.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const WRONG_PASSWORD: &str = "Old password is not correct.";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub password: String,
    pub password_confirm: String,
    /// Only settable by trusted callers such as the admin CLI.
    #[serde(skip)]
    pub is_staff: bool,
}

/// Profile edit. Passwords go through [`change_password`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangePassword {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Lower-case the domain part of an address; the local part is kept as
/// typed.
pub fn normalize_email(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let (local, domain) = trimmed.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains(char::is_whitespace) {
        return None;
    }
    Some(format!("{local}@{}", domain.to_lowercase()))
}

fn normalize_mobile(errors: &mut ValidationErrors, value: Option<&str>) -> Option<String> {
    let mobile = value.map(str::trim).filter(|m| !m.is_empty())?;
    if mobile.chars().count() > MOBILE_MAX {
        errors.add(
            "mobile",
            format!("Ensure this field has no more than {MOBILE_MAX} characters."),
        );
        return None;
    }
    Some(mobile.to_string())
}

fn check_password(errors: &mut ValidationErrors, field: &str, password: &str, confirm: &str) {
    if password.chars().count() < PASSWORD_MIN {
        errors.add(
            field,
            format!("Ensure this field has at least {PASSWORD_MIN} characters."),
        );
    }
    if password != confirm {
        errors.add(NON_FIELD_ERRORS, PASSWORDS_DIFFER);
    }
}

pub fn hash_password(password: &str) -> Result<String, DbErr> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| DbErr::Custom(format!("hash error: {err}")))
}

pub fn verify_password(account: &user::Model, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(&account.password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Create an account. Email and mobile stay reserved by archived accounts.
pub async fn register_user<C: ConnectionTrait>(
    conn: &C,
    input: NewUser,
) -> BoardsResult<user::Model> {
    let mut errors = ValidationErrors::new();
    let email = normalize_email(&input.email);
    if email.is_none() {
        errors.add("email", INVALID_EMAIL);
    }
    let mobile = normalize_mobile(&mut errors, input.mobile.as_deref());
    check_password(&mut errors, "password", &input.password, &input.password_confirm);

    if let Some(email) = &email {
        let taken = user::Entity::find_original()
            .filter(user::Column::Email.eq(email.as_str()))
            .count(conn)
            .await?;
        if taken > 0 {
            errors.add("email", EMAIL_TAKEN);
        }
    }
    if let Some(mobile) = &mobile {
        let taken = user::Entity::find_original()
            .filter(user::Column::Mobile.eq(mobile.as_str()))
            .count(conn)
            .await?;
        if taken > 0 {
            errors.add("mobile", MOBILE_TAKEN);
        }
    }
    errors.into_result()?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.unwrap_or_default()),
        first_name: Set(input.first_name.trim().to_string()),
        last_name: Set(input.last_name.trim().to_string()),
        mobile: Set(mobile),
        password_hash: Set(hash_password(&input.password)?),
        avatar: Set(input
            .avatar
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string())),
        is_staff: Set(input.is_staff),
        is_active: Set(true),
        date_joined: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    // A concurrent registration can still win the race past the check above.
    .map_err(|err| {
        BoardsError::from_unique_violations(
            err,
            &[("mobile", MOBILE_TAKEN), ("email", EMAIL_TAKEN)],
        )
    })?;
    info!(user = %created.id, "user registered");
    Ok(created)
}

pub async fn update_profile<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    patch: ProfilePatch,
) -> BoardsResult<user::Model> {
    let account = active_user(conn, user_id).await?;
    let mut errors = ValidationErrors::new();
    let mobile = match &patch.mobile {
        Some(value) => Some(normalize_mobile(&mut errors, Some(value))),
        None => None,
    };
    if let Some(Some(mobile)) = &mobile {
        let taken = user::Entity::find_original()
            .filter(user::Column::Mobile.eq(mobile.as_str()))
            .filter(user::Column::Id.ne(user_id))
            .count(conn)
            .await?;
        if taken > 0 {
            errors.add("mobile", MOBILE_TAKEN);
        }
    }
    errors.into_result()?;

    let mut active: user::ActiveModel = account.into();
    if let Some(first_name) = patch.first_name {
        active.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = patch.last_name {
        active.last_name = Set(last_name.trim().to_string());
    }
    if let Some(mobile) = mobile {
        active.mobile = Set(mobile);
    }
    if let Some(avatar) = patch.avatar.filter(|path| !path.trim().is_empty()) {
        active.avatar = Set(avatar);
    }
    active.updated_at = Set(Utc::now().into());
    active
        .update(conn)
        .await
        .map_err(|err| BoardsError::from_unique_violation(err, "mobile", MOBILE_TAKEN))
}

pub async fn change_password<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    input: ChangePassword,
) -> BoardsResult<()> {
    let account = active_user(conn, user_id).await?;
    let mut errors = ValidationErrors::new();
    if !verify_password(&account, &input.old_password) {
        errors.add("old_password", WRONG_PASSWORD);
    }
    check_password(
        &mut errors,
        "new_password",
        &input.new_password,
        &input.new_password_confirm,
    );
    errors.into_result()?;

    let mut active: user::ActiveModel = account.into();
    active.password_hash = Set(hash_password(&input.new_password)?);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

/// Check credentials for an active account.
pub async fn authenticate<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    password: &str,
) -> BoardsResult<Option<user::Model>> {
    let Some(email) = normalize_email(email) else {
        return Ok(None);
    };
    let account = user::Entity::find_active()
        .filter(user::Column::Email.eq(email))
        .one(conn)
        .await?;
    Ok(account.filter(|account| verify_password(account, password)))
}

async fn active_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> BoardsResult<user::Model> {
    user::Entity::find_active_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("user", user_id))
}

/// Active work spaces the user belongs to as a member.
pub async fn membered_work_spaces<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> BoardsResult<Vec<work_space::Model>> {
    let ids: Vec<Uuid> = work_space_member::Entity::find()
        .select_only()
        .column(work_space_member::Column::WorkSpaceId)
        .filter(work_space_member::Column::UserId.eq(user_id))
        .into_tuple()
        .all(conn)
        .await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(work_space::Entity::find_active()
        .filter(work_space::Column::Id.is_in(ids))
        .order_by_asc(work_space::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Active work spaces the user owns.
pub async fn owned_work_spaces<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> BoardsResult<Vec<work_space::Model>> {
    Ok(work_space::Entity::find_active()
        .filter(work_space::Column::OwnerId.eq(user_id))
        .order_by_asc(work_space::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Active tasks the user is assigned to.
pub async fn assigned_tasks<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> BoardsResult<Vec<task::Model>> {
    let ids = assigned_task_ids(conn, user_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(task::Entity::find_active()
        .filter(task::Column::Id.is_in(ids))
        .order_by_asc(task::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Assigned tasks whose deadline has not passed yet, or that have none.
pub async fn tasks_with_deadline<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> BoardsResult<Vec<task::Model>> {
    let ids = assigned_task_ids(conn, user_id).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    Ok(task::Entity::find_active()
        .filter(task::Column::Id.is_in(ids))
        .filter(
            Condition::any()
                .add(task::Column::EndDate.is_null())
                .add(task::Column::EndDate.gte(now)),
        )
        .order_by_asc(task::Column::EndDate)
        .all(conn)
        .await?)
}

/// Active boards holding at least one task assigned to the user.
pub async fn tasked_boards<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> BoardsResult<Vec<board::Model>> {
    let list_ids: BTreeSet<Uuid> = assigned_tasks(conn, user_id)
        .await?
        .into_iter()
        .map(|task| task.task_list_id)
        .collect();
    if list_ids.is_empty() {
        return Ok(Vec::new());
    }
    let board_ids: BTreeSet<Uuid> = task_list::Entity::find_active()
        .select_only()
        .column(task_list::Column::BoardId)
        .filter(task_list::Column::Id.is_in(list_ids))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    if board_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(board::Entity::find_active()
        .filter(board::Column::Id.is_in(board_ids))
        .order_by_asc(board::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// What the user did on tasks of one board, oldest first.
pub async fn activities_on_board<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    board_id: Uuid,
) -> BoardsResult<Vec<activity::Model>> {
    Ok(activity::Entity::find()
        .filter(activity::Column::DoerId.eq(user_id))
        .filter(activity::Column::TaskId.in_subquery(crate::activity::board_task_ids(board_id)))
        .order_by_asc(activity::Column::CreatedAt)
        .order_by_asc(activity::Column::Id)
        .all(conn)
        .await?)
}

/// Everyone the user shares a work space with, the user excluded. The
/// owner counts as a teammate of every member.
pub async fn teammates<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    work_space_id: Uuid,
) -> BoardsResult<Vec<user::Model>> {
    let space = work_space::Entity::find_active_by_id(work_space_id)
        .one(conn)
        .await?
        .ok_or_else(|| BoardsError::not_found("work_space", work_space_id))?;
    let in_space = space.owner_id == user_id
        || work_spaces::is_member(conn, work_space_id, user_id).await?;
    if !in_space {
        return Ok(Vec::new());
    }
    let mut ids = work_spaces::assignable_user_ids(conn, &space).await?;
    ids.remove(&user_id);
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(user::Entity::find_active()
        .filter(user::Column::Id.is_in(ids))
        .order_by_asc(user::Column::Email)
        .all(conn)
        .await?)
}

async fn assigned_task_ids<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> BoardsResult<Vec<Uuid>> {
    Ok(task_assignee::Entity::find()
        .select_only()
        .column(task_assignee::Column::TaskId)
        .filter(task_assignee::Column::UserId.eq(user_id))
        .into_tuple()
        .all(conn)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_domain_is_lower_cased_local_part_kept() {
        assert_eq!(
            normalize_email("  Ali.Test@Example.COM ").as_deref(),
            Some("Ali.Test@example.com")
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("ali@"), None);
    }

    #[test]
    fn mobile_is_optional_and_bounded() {
        let mut errors = ValidationErrors::new();
        assert_eq!(normalize_mobile(&mut errors, Some("   ")), None);
        assert_eq!(normalize_mobile(&mut errors, None), None);
        assert_eq!(
            normalize_mobile(&mut errors, Some("09120000000")).as_deref(),
            Some("09120000000")
        );
        assert!(errors.is_empty());
        assert_eq!(normalize_mobile(&mut errors, Some("091200000001")), None);
        assert!(errors.contains("mobile"));
    }

    #[test]
    fn password_confirmation_must_match() {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "password", "correct horse", "correct horse");
        assert!(errors.is_empty());
        check_password(&mut errors, "password", "short", "other");
        assert!(errors.contains("password"));
        assert!(errors.contains(NON_FIELD_ERRORS));
    }

    #[test]
    fn hashes_verify_against_the_original_password_only() {
        let hash = hash_password("correct horse").unwrap();
        let now: DateTimeWithTimeZone = Utc::now().into();
        let account = user::Model {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            mobile: None,
            password_hash: hash,
            avatar: DEFAULT_AVATAR.into(),
            is_staff: false,
            is_active: true,
            date_joined: now,
            created_at: now,
            updated_at: now,
        };
        assert!(verify_password(&account, "correct horse"));
        assert!(!verify_password(&account, "battery staple"));
    }
}
