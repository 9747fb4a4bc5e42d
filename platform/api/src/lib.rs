use std::{collections::BTreeMap, fmt, sync::Arc};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Shared result type for anything handed back to a client.
pub type ApiResult<T> = Result<T, ApiError>;

/// Field-level validation messages, keyed by field name.
///
/// `non_field_errors` collects messages that do not belong to one field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was collected, otherwise the errors themselves.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("permission denied")]
    Forbidden,
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHENTICATED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!(error = ?err, "request failed");
        }
        let mut body = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let ApiError::Validation(fields) = &self {
            body["fields"] = json!(fields);
        }
        (self.status(), Json(body)).into_response()
    }
}

/// Convert any error into a client payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> ApiError {
    ApiError::internal(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "internal server error");
        assert_eq!(err.code(), "INTERNAL");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let mut errors = ValidationErrors::new();
        errors.add("password_confirm", "Passwords do not match.");
        errors.add("email", "A user with that email already exists.");
        let err = ApiError::from(errors);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "validation failed: email: A user with that email already exists.; \
             password_confirm: Passwords do not match."
        );
    }

    #[test]
    fn not_found_is_distinct_from_validation() {
        let err = ApiError::NotFound { entity: "board" };
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn empty_errors_pass() {
        assert!(ValidationErrors::new().into_result().is_ok());
        let merged = {
            let mut a = ValidationErrors::single("title", "This field may not be blank.");
            a.merge(ValidationErrors::single("title", "Too long."));
            a
        };
        assert_eq!(merged.get("title").map(<[String]>::len), Some(2));
    }
}
