use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership row. The owner of a work space must never appear here; the
/// store does not enforce it, callers validate before trusting membership.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_space_member")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub work_space_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work_space::Entity",
        from = "Column::WorkSpaceId",
        to = "super::work_space::Column::Id",
        on_delete = "Cascade"
    )]
    WorkSpace,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::work_space::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkSpace.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
