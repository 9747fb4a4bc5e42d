use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::visibility::SoftDelete;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task_list")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub order: i32,
    #[sea_orm(indexed)]
    pub board_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Board,
    Task,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Board => Entity::belongs_to(super::board::Entity)
                .from(Column::BoardId)
                .to(super::board::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Self::Task => Entity::has_many(super::task::Entity).into(),
        }
    }
}

impl Related<super::board::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Board.def()
    }
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl SoftDelete for Entity {
    fn id_column() -> Column {
        Column::Id
    }

    fn active_column() -> Column {
        Column::IsActive
    }

    fn updated_at_column() -> Column {
        Column::UpdatedAt
    }
}
