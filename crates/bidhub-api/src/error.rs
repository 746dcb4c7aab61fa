use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use bidhub_types::api::ErrorResponse;

use crate::validation::ValidationErrors;

/// Message shown for every reset-token failure, whatever the internal cause.
pub const INVALID_RESET_LINK: &str = "Reset link is invalid or expired";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("reset token is unknown or already used")]
    InvalidToken,

    #[error("reset token has expired")]
    ExpiredToken,

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Incorrect login")]
    Unauthorized,

    #[error("Go away spammer")]
    Spam,

    #[error("dependency failure: {0}")]
    Dependency(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::InvalidToken | Self::ExpiredToken)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match &self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Invalid submission".to_string(),
                errors.to_bodies(),
            ),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), vec![]),
            ApiError::InvalidToken | ApiError::ExpiredToken => {
                (StatusCode::BAD_REQUEST, INVALID_RESET_LINK.to_string(), vec![])
            }
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string(), vec![]),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), vec![]),
            ApiError::Spam => (StatusCode::BAD_REQUEST, self.to_string(), vec![]),
            ApiError::Dependency(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                    vec![],
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                errors,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldErrorKind;

    #[test]
    fn token_errors_share_one_response() {
        let invalid = ApiError::InvalidToken.into_response();
        let expired = ApiError::ExpiredToken.into_response();

        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(expired.status(), StatusCode::BAD_REQUEST);
        assert_ne!(ApiError::InvalidToken.to_string(), ApiError::ExpiredToken.to_string());
    }

    #[test]
    fn status_codes() {
        let mut errors = ValidationErrors::new();
        errors.push("title", FieldErrorKind::Required, "Please enter a title");

        assert_eq!(ApiError::from(errors).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("listing").into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("email").into_response().status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Dependency(anyhow::anyhow!("db down")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
