use entity::{SoftDelete, user};
use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::error::{BoardsError, BoardsResult};

/// The authenticated user on whose behalf an operation runs. Supplied by the
/// authentication layer; activity rows are attributed to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub display_name: String,
    pub is_staff: bool,
}

impl Actor {
    pub fn from_user(user: &user::Model) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name(),
            is_staff: user.is_staff,
        }
    }

    /// Load an active account. Archived accounts cannot act.
    pub async fn load<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> BoardsResult<Self> {
        let user = user::Entity::find_active_by_id(user_id)
            .one(conn)
            .await?
            .ok_or_else(|| BoardsError::not_found("user", user_id))?;
        Ok(Self::from_user(&user))
    }
}
