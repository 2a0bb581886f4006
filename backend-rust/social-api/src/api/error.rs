use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::models::ApiResponse;
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Validation,
    Unauthorized,
    Internal,
}

/// An operational failure with a machine category and a human message,
/// rendered as `{"errors": {"message": ...}, "message": category}`.
#[derive(Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub category: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn not_found(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, category, message)
    }

    pub fn conflict(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, category, message)
    }

    pub fn forbidden(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, category, message)
    }

    pub fn validation(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, category, message)
    }

    pub fn unauthorized(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, category, message)
    }

    pub fn internal(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, category, message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(&self.message, &self.category))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::not_found("Not Found", format!("{} not found", what)),
            other => {
                log::error!("Store error: {}", other);
                ApiError::internal("Internal Server Error", "Something went wrong")
            }
        }
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(e: bcrypt::BcryptError) -> Self {
        log::error!("Password hashing failed: {}", e);
        ApiError::internal("Internal Server Error", "Something went wrong")
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        log::error!("Token generation failed: {}", e);
        ApiError::internal("Internal Server Error", "Something went wrong")
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        log::error!("Serialization failed: {}", e);
        ApiError::internal("Internal Server Error", "Something went wrong")
    }
}

/// Gives a store lookup a handler-specific 404.
pub trait OrNotFound<T> {
    fn or_not_found(self, category: &str, message: &str) -> Result<T, ApiError>;
}

impl<T> OrNotFound<T> for StoreResult<T> {
    fn or_not_found(self, category: &str, message: &str) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::not_found(category, message),
            other => ApiError::from(other),
        })
    }
}

/// Field rules of a request body, as a 400.
pub fn validated(result: Result<(), String>, category: &str) -> Result<(), ApiError> {
    result.map_err(|message| ApiError::validation(category, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::not_found("X", "y").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("X", "y").status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::forbidden("X", "y").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::validation("X", "y").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("X", "y").status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_store_errors_map_to_status() {
        let err: ApiError = StoreError::NotFound("Post p1".to_string()).into();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err: ApiError = StoreError::LockPoisoned.into();
        assert_eq!(err.kind, ErrorKind::Internal);

        let missing: StoreResult<()> = Err(StoreError::NotFound("Post p1".to_string()));
        let err = missing.or_not_found("Get Post Error", "Post not found").unwrap_err();
        assert_eq!(err.category, "Get Post Error");
    }
}
