use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use bidhub_types::api::{LoginRequest, RegisterRequest, SessionResponse};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::password::{MIN_PASSWORD_LEN, create_session_token, hash_password, verify_password};
use crate::state::AppState;
use crate::validation::{
    FieldErrorKind, ValidationErrors, check_username, looks_like_email, normalize_email,
};

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.honeypot.as_deref().is_some_and(|v| !v.is_empty()) {
        return Err(ApiError::Spam);
    }

    let email = normalize_email(&req.email);

    let mut errors = ValidationErrors::new();
    let username = check_username(&mut errors, &req.username);
    if !looks_like_email(&email) {
        errors.push("email", FieldErrorKind::Invalid, "Please enter a valid email");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            "password",
            FieldErrorKind::TooShort,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    let (true, Some(username)) = (errors.is_empty(), username) else {
        return Err(errors.into());
    };

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let user_id = Uuid::new_v4();

    // Check and insert under one write lock.
    let st = state.clone();
    let (name, mail) = (username.clone(), email);
    blocking(move || -> Result<(), ApiError> {
        let uow = st.db.begin()?;
        if uow.get_user_by_email(&mail)?.is_some() {
            return Err(ApiError::Conflict("account with that email"));
        }
        if uow.get_user_by_username(&name)?.is_some() {
            return Err(ApiError::Conflict("username"));
        }
        uow.create_user(&user_id.to_string(), &name, &mail, &password_hash)?;
        uow.commit()?;
        Ok(())
    })
    .await?;

    info!("Registered user {} ({})", username, user_id);

    let token = create_session_token(&state.jwt_secret, user_id, &username)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id,
            username,
            token,
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let email = normalize_email(&req.email);
    let user = blocking(move || st.db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let password = req.password;
    let stored = user.password.clone();
    if !blocking(move || verify_password(&password, &stored)).await? {
        return Err(ApiError::Unauthorized);
    }

    let user_id: Uuid = user.id.parse().map_err(anyhow::Error::from)?;

    let token = create_session_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(SessionResponse {
        user_id,
        username: user.username,
        token,
    }))
}
