use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use tracing::debug;

use crate::error::ApiError;
use crate::validation::{FieldErrorKind, ValidationErrors};

/// `Json` whose rejections are reported as a structured validation error on
/// the `body` field instead of axum's plain-text response.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                let mut errors = ValidationErrors::new();
                errors.push("body", FieldErrorKind::Invalid, rejection.body_text());
                Err(errors.into())
            }
        }
    }
}
