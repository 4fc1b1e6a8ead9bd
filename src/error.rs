//! HTTP error mapping.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::db::StoreError;
use crate::generator::validation::ValidationErrors;
use crate::generator::GeneratorError;
use crate::registry::RegistryError;
use crate::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    /// The message is safe to show; details are logged where the error is built.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Log `detail` and return a generic 500.
    pub fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        log::error!("{}: {}", context, detail);
        ApiError::Internal(context.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::Validation(_) => "BadRequest",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Internal(_) => "InternalServerError",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.kind(), &self.to_string()))
    }
}

impl From<GeneratorError> for ApiError {
    fn from(error: GeneratorError) -> Self {
        match error {
            GeneratorError::TemplateNotFound(_) | GeneratorError::PackNotFound(_) => {
                ApiError::NotFound(error.to_string())
            }
            GeneratorError::Registry(e) => e.into(),
            other => ApiError::internal("Document generation failed", other),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(_) | RegistryError::PackNotFound(_) => {
                ApiError::NotFound(error.to_string())
            }
            RegistryError::AlreadyExists(_) => ApiError::Conflict(error.to_string()),
            RegistryError::InvalidId(_)
            | RegistryError::InvalidSchema(_)
            | RegistryError::InvalidDocument(_) => ApiError::Validation(error.to_string()),
            other => ApiError::internal("Template storage failed", other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate(_) => ApiError::Conflict(error.to_string()),
            StoreError::NotFound(_) => ApiError::NotFound(error.to_string()),
            other => ApiError::internal("Database operation failed", other),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err: ApiError = GeneratorError::Io(std::io::Error::other("disk on fire")).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_registry_mapping() {
        let err: ApiError = RegistryError::AlreadyExists("t".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let err: ApiError = RegistryError::InvalidSchema("bad".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err: ApiError = GeneratorError::TemplateNotFound("t".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
