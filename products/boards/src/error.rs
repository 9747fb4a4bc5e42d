use platform_api::{ApiError, ValidationErrors};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

pub type BoardsResult<T> = Result<T, BoardsError>;

#[derive(Debug, Error)]
pub enum BoardsError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("permission denied")]
    Forbidden,
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

impl BoardsError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Validation messages, if this is a validation failure.
    pub fn fields(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Turn a store uniqueness violation into a field error; anything else
    /// stays a store error.
    pub fn from_unique_violation(err: DbErr, field: &str, message: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::validation(field, message),
            _ => Self::Db(err),
        }
    }

    /// Like [`Self::from_unique_violation`] for rows guarded by several
    /// unique columns. `candidates` pairs a field with its message; the field
    /// is picked by the column or index name the store reports.
    pub fn from_unique_violations(err: DbErr, candidates: &[(&str, &str)]) -> Self {
        let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() else {
            return Self::Db(err);
        };
        match violated_field(&detail, candidates) {
            Some((field, message)) => Self::validation(field, message),
            None => Self::Db(err),
        }
    }
}

fn violated_field<'a>(
    detail: &str,
    candidates: &[(&'a str, &'a str)],
) -> Option<(&'a str, &'a str)> {
    candidates
        .iter()
        .copied()
        .find(|(field, _)| detail.contains(field))
}

impl From<ValidationErrors> for BoardsError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<BoardsError> for ApiError {
    fn from(value: BoardsError) -> Self {
        match value {
            BoardsError::Validation(errors) => ApiError::Validation(errors),
            BoardsError::NotFound { entity, .. } => ApiError::NotFound { entity },
            BoardsError::Forbidden => ApiError::Forbidden,
            BoardsError::Db(err) => ApiError::internal(anyhow::Error::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_client_taxonomy() {
        let id = Uuid::new_v4();
        let api: ApiError = BoardsError::not_found("task", id).into();
        assert_eq!(api.code(), "NOT_FOUND");

        let api: ApiError = BoardsError::validation("title", "This field may not be blank.").into();
        assert_eq!(api.code(), "VALIDATION");

        let api: ApiError = BoardsError::Db(DbErr::Custom("boom".into())).into();
        assert_eq!(api.to_string(), "internal server error");
    }

    #[test]
    fn non_unique_errors_stay_store_errors() {
        let err = BoardsError::from_unique_violation(
            DbErr::Custom("connection reset".into()),
            "email",
            "A user with that email already exists.",
        );
        assert!(matches!(err, BoardsError::Db(_)));
    }

    #[test]
    fn violations_name_the_column_that_clashed() {
        let candidates = [("mobile", "mobile taken"), ("email", "email taken")];
        assert_eq!(
            violated_field("UNIQUE constraint failed: user.mobile", &candidates),
            Some(("mobile", "mobile taken"))
        );
        assert_eq!(
            violated_field(
                "duplicate key value violates unique constraint \"idx_user_email\"",
                &candidates
            ),
            Some(("email", "email taken"))
        );
        assert_eq!(violated_field("UNIQUE constraint failed: user.id", &candidates), None);
    }
}
