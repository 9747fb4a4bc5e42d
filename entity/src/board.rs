use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::visibility::SoftDelete;

pub const DEFAULT_BACKGROUND: &str = "uploads/backgrounds/default_background.jpg";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "board")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    /// Opaque storage path, never interpreted here.
    pub background_image: String,
    #[sea_orm(indexed)]
    pub work_space_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    WorkSpace,
    TaskList,
    Label,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::WorkSpace => Entity::belongs_to(super::work_space::Entity)
                .from(Column::WorkSpaceId)
                .to(super::work_space::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Self::TaskList => Entity::has_many(super::task_list::Entity).into(),
            Self::Label => Entity::has_many(super::label::Entity).into(),
        }
    }
}

impl Related<super::work_space::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkSpace.def()
    }
}

impl Related<super::task_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskList.def()
    }
}

impl Related<super::label::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Label.def()
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
