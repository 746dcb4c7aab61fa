//! Password reset tokens.
//!
//! A token is issued for an existing account, mailed as a link, and can be
//! consumed exactly once within 24 hours. Consuming it deletes the token and
//! replaces the password hash in one transaction.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use bidhub_db::models::ResetTokenRow;
use bidhub_db::{decode_timestamp, encode_timestamp};
use bidhub_types::api::{
    ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, ResetTokenStatus,
    SessionResponse,
};
use bidhub_types::models::Account;

use crate::email::reset_password_email;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::password::{MIN_PASSWORD_LEN, create_session_token, hash_password};
use crate::state::AppState;
use crate::validation::{FieldErrorKind, ValidationErrors, looks_like_email, normalize_email};
use crate::blocking;

pub const RESET_TOKEN_TTL_HOURS: i64 = 24;

const RESET_EMAIL_SUBJECT: &str = "Reset your password";

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Create a reset token for `email` and mail the reset link.
///
/// Fails with `NotFound` when no account has this email. Whether to tell the
/// user is up to the caller.
pub async fn issue_reset_token(state: &AppState, email: &str) -> Result<IssuedToken, ApiError> {
    let email = normalize_email(email);

    let st = state.clone();
    let lookup = email.clone();
    let account = blocking(move || st.db.get_user_by_email(&lookup)).await?;
    if account.is_none() {
        return Err(ApiError::NotFound("account"));
    }

    let token = Uuid::new_v4().to_string();
    let now = state.clock.now();
    let expires_at = now + TimeDelta::hours(RESET_TOKEN_TTL_HOURS);

    let st = state.clone();
    let (tok, em) = (token.clone(), email.clone());
    blocking(move || {
        st.db.create_reset_token(
            &tok,
            &em,
            &encode_timestamp(expires_at),
            &encode_timestamp(now),
        )
    })
    .await?;

    let link = format!(
        "{}/reset-password/{}",
        state.public_url.trim_end_matches('/'),
        token
    );
    state
        .email
        .send(&email, RESET_EMAIL_SUBJECT, &reset_password_email(&link))
        .await
        .map_err(|e| {
            error!("Failed to send reset email: {:#}", e);
            ApiError::Dependency(e)
        })?;

    info!("Issued password reset token {} (expires {})", redact(&token), expires_at);
    Ok(IssuedToken {
        token,
        email,
        expires_at,
    })
}

/// Returns the email the token was issued for if it can still be used.
pub async fn validate_reset_token(state: &AppState, token: &str) -> Result<String, ApiError> {
    let st = state.clone();
    let tok = token.to_string();
    let record = blocking(move || st.db.find_reset_token(&tok)).await?;
    let record = check_token(record, state.clock.now())?;
    Ok(record.email)
}

/// Set a new password using the token, then forget the token.
///
/// Unknown and expired tokens are turned away before the password is hashed.
/// The token is looked up again inside the transaction: a token seen as
/// valid before hashing may have expired or been used since.
pub async fn consume_reset_token(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<Account, ApiError> {
    if let Err(e) = validate_reset_token(state, token).await {
        if e.is_token_error() {
            debug!("Reset rejected before hashing: {}", e);
        }
        return Err(e);
    }

    let password = new_password.to_string();
    let hash = blocking(move || hash_password(&password)).await?;

    let st = state.clone();
    let tok = token.to_string();
    let now = state.clock.now();
    let account = blocking(move || -> Result<Account, ApiError> {
        let uow = st.db.begin()?;
        let record = check_token(uow.find_reset_token(&tok)?, now)?;

        if !uow.delete_reset_token(&record.token)? {
            return Err(ApiError::InvalidToken);
        }
        let user = uow
            .update_password_by_email(&record.email, &hash)?
            .ok_or(ApiError::NotFound("account"))?;
        let account = user.into_account()?;

        uow.commit()?;
        Ok(account)
    })
    .await;

    match &account {
        Ok(account) => info!("Password reset for user {}", account.id),
        Err(e) if e.is_token_error() => debug!("Reset rejected: {}", e),
        Err(e) => warn!("Reset failed: {}", e),
    }
    account
}

fn check_token(record: Option<ResetTokenRow>, now: DateTime<Utc>) -> Result<ResetTokenRow, ApiError> {
    let record = record.ok_or(ApiError::InvalidToken)?;
    let expires_at = decode_timestamp(&record.expires_at)?;
    if now >= expires_at {
        return Err(ApiError::ExpiredToken);
    }
    Ok(record)
}

fn redact(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

// -- Handlers --

/// POST /auth/forgot-password
///
/// Answers the same way whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.honeypot.as_deref().is_some_and(|v| !v.is_empty()) {
        return Err(ApiError::Spam);
    }

    if !looks_like_email(req.email.trim()) {
        let mut errors = ValidationErrors::new();
        errors.push("email", FieldErrorKind::Invalid, "Please enter a valid email");
        return Err(errors.into());
    }

    match issue_reset_token(&state, &req.email).await {
        Ok(_) => {}
        Err(ApiError::NotFound(_)) => debug!("Reset requested for unknown email"),
        Err(e) => return Err(e),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ForgotPasswordResponse { success: true }),
    ))
}

/// GET /auth/reset-password/{token}
pub async fn check_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_reset_token(&state, &token).await?;
    Ok(Json(ResetTokenStatus { valid: true }))
}

/// POST /auth/reset-password/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = ValidationErrors::new();
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(
            "password",
            FieldErrorKind::TooShort,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    if req.password != req.confirm_password {
        errors.push("confirm_password", FieldErrorKind::Mismatch, "Passwords don't match");
    }
    errors.finish(|| ())?;

    let account = consume_reset_token(&state, &token, &req.password).await?;

    let session = create_session_token(&state.jwt_secret, account.id, &account.username)?;

    Ok(Json(SessionResponse {
        user_id: account.id,
        username: account.username,
        token: session,
    }))
}
