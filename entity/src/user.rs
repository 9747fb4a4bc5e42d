use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::visibility::SoftDelete;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[sea_orm(unique)]
    pub mobile: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// First and last name joined by a space, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Name used in activity messages; falls back to the email when the
    /// account has no name on file.
    pub fn display_name(&self) -> String {
        let full = self.full_name();
        if full.is_empty() {
            self.email.clone()
        } else {
            full
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    OwnedWorkSpace,
    Membership,
    Assignment,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::OwnedWorkSpace => Entity::has_many(super::work_space::Entity).into(),
            Self::Membership => Entity::has_many(super::work_space_member::Entity).into(),
            Self::Assignment => Entity::has_many(super::task_assignee::Entity).into(),
        }
    }
}

impl Related<super::work_space::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OwnedWorkSpace.def()
    }
}

impl Related<super::work_space_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl Related<super::task_assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(first: &str, last: &str) -> Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        Model {
            id: Uuid::new_v4(),
            email: "ata@example.com".into(),
            first_name: first.into(),
            last_name: last.into(),
            mobile: None,
            password_hash: String::new(),
            avatar: String::new(),
            is_staff: false,
            is_active: true,
            date_joined: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn full_name_is_trimmed() {
        assert_eq!(sample("ata", "test").full_name(), "ata test");
        assert_eq!(sample("ata", "").full_name(), "ata");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(sample("", "").display_name(), "ata@example.com");
    }
}
