use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which rows of a soft-deletable table a query should see.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only `is_active = true` rows. What list/detail lookups use.
    #[default]
    Active,
    /// Every row regardless of state. Cascades must use this.
    All,
    /// Only `is_active = false` rows (recycle bin).
    Archived,
}

/// Query entry points for tables carrying an `is_active` flag.
///
/// The three accessors return the ordinary [`Select`] so callers keep
/// composing filters and ordering on top of them.
pub trait SoftDelete: EntityTrait {
    fn id_column() -> Self::Column;
    fn active_column() -> Self::Column;
    fn updated_at_column() -> Self::Column;

    fn find_active() -> Select<Self> {
        Self::find().filter(Self::active_column().eq(true))
    }

    fn find_original() -> Select<Self> {
        Self::find()
    }

    fn find_archived() -> Select<Self> {
        Self::find().filter(Self::active_column().eq(false))
    }

    fn find_in(visibility: Visibility) -> Select<Self> {
        match visibility {
            Visibility::Active => Self::find_active(),
            Visibility::All => Self::find_original(),
            Visibility::Archived => Self::find_archived(),
        }
    }

    fn find_active_by_id(id: Uuid) -> Select<Self> {
        Self::find_active().filter(Self::id_column().eq(id))
    }

    fn find_original_by_id(id: Uuid) -> Select<Self> {
        Self::find_original().filter(Self::id_column().eq(id))
    }
}
