use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::{error, info};

use bidhub_db::models::ProfileChanges;
use bidhub_types::api::{Claims, EditProfileRequest};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::images::ImagePreset;
use crate::listing_rules::check_image;
use crate::state::AppState;
use crate::validation::{ValidationErrors, check_username, optional_text};

const MAX_NAME_LEN: usize = 100;

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let id = claims.sub.to_string();
    let user = blocking(move || st.db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("account"))?;
    Ok(Json(user.into_account()?))
}

/// PATCH /users/me
///
/// Only the fields present in the body are changed.
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<EditProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = ValidationErrors::new();
    let username = req
        .username
        .as_deref()
        .and_then(|name| check_username(&mut errors, name));
    let first_name = optional_text(&mut errors, "first_name", req.first_name.as_deref(), MAX_NAME_LEN);
    let last_name = optional_text(&mut errors, "last_name", req.last_name.as_deref(), MAX_NAME_LEN);
    let avatar = req
        .avatar
        .as_ref()
        .and_then(|upload| check_image(&mut errors, "avatar".to_string(), upload));
    errors.finish(|| ())?;

    let avatar_url = match avatar {
        Some(image) => {
            let stored = state
                .images
                .upload(&image.bytes, ImagePreset::Avatar)
                .await
                .map_err(|e| {
                    error!("Avatar upload failed for {}: {:#}", image.filename, e);
                    ApiError::Dependency(e)
                })?;
            Some(stored.url)
        }
        None => None,
    };

    let changes = ProfileChanges {
        username,
        first_name,
        last_name,
        avatar_url,
    };

    let st = state.clone();
    let id = claims.sub.to_string();
    let user = blocking(move || -> Result<_, ApiError> {
        let uow = st.db.begin()?;
        if let Some(name) = &changes.username {
            if let Some(owner) = uow.get_user_by_username(name)? {
                if owner.id != id {
                    return Err(ApiError::Conflict("username"));
                }
            }
        }
        let user = uow
            .update_profile(&id, &changes)?
            .ok_or(ApiError::NotFound("account"))?;
        uow.commit()?;
        Ok(user)
    })
    .await?;

    info!("Profile updated for user {}", user.id);
    Ok(Json(user.into_account()?))
}
