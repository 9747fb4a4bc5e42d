use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Board-scoped label. Labels have no `is_active` flag and are hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "label")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(indexed)]
    pub board_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Board,
    TaskLabel,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Board => Entity::belongs_to(super::board::Entity)
                .from(Column::BoardId)
                .to(super::board::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Self::TaskLabel => Entity::has_many(super::task_label::Entity).into(),
        }
    }
}

impl Related<super::board::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Board.def()
    }
}

impl Related<super::task_label::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskLabel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
