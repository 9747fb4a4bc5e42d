use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::visibility::SoftDelete;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// The list a task sits in doubles as its status column.
    #[sea_orm(indexed)]
    pub task_list_id: Uuid,
    pub order: i32,
    pub start_date: Option<DateTimeWithTimeZone>,
    pub end_date: Option<DateTimeWithTimeZone>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    TaskList,
    Comment,
    Attachment,
    Activity,
    TaskLabel,
    Assignee,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::TaskList => Entity::belongs_to(super::task_list::Entity)
                .from(Column::TaskListId)
                .to(super::task_list::Column::Id)
                .on_delete(ForeignKeyAction::Cascade)
                .into(),
            Self::Comment => Entity::has_many(super::comment::Entity).into(),
            Self::Attachment => Entity::has_many(super::attachment::Entity).into(),
            Self::Activity => Entity::has_many(super::activity::Entity).into(),
            Self::TaskLabel => Entity::has_many(super::task_label::Entity).into(),
            Self::Assignee => Entity::has_many(super::task_assignee::Entity).into(),
        }
    }
}

impl Related<super::task_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskList.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachment.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl Related<super::task_label::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskLabel.def()
    }
}

impl Related<super::task_assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignee.def()
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
