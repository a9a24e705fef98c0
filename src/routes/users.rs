use actix_web::{delete, get, put, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

use crate::{
    auth::AuthenticatedUser,
    blob::USER_AVATARS_FOLDER,
    error::AppError,
    form::{RequestForm, AVATAR},
    models::{UpdateProfileRequest, User, UserChanges, UserProfile},
    state::AppState,
};

fn profile(state: &AppState, user: User) -> UserProfile {
    UserProfile {
        avatar: user.avatar_key.map(|key| state.blobs.resolve_url(&key)),
        email: user.email,
        name: user.name,
    }
}

/// The token's subject. A token that outlived its user is treated as unauthorized.
async fn current_user(state: &AppState, caller: &AuthenticatedUser) -> Result<User, AppError> {
    state
        .repo
        .find_user_by_id(caller.id)
        .await?
        .ok_or_else(AppError::unauthorized)
}

/// Returns `{email, name, avatar}` for the authenticated user.
#[get("/me")]
pub async fn get_profile(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = current_user(&state, &caller).await?;
    Ok(HttpResponse::Ok().json(profile(&state, user)))
}

/// Updates the caller's name and, when an `avatar` file is sent, replaces the avatar.
///
/// The new avatar is stored and the record updated before the previous avatar blob
/// is removed. Failing to remove the old blob is logged and does not fail the request.
///
/// ## Responses:
/// - `200 OK`: The updated profile.
/// - `400 Bad Request`: `name` missing or shorter than 2 characters, or a bad upload.
/// - `401 Unauthorized`: No valid token, or its user no longer exists.
#[put("/me")]
pub async fn update_profile(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<impl Responder, AppError> {
    let user = current_user(&state, &caller).await?;

    let form = RequestForm::read(&req, payload, AVATAR).await?;
    let input: UpdateProfileRequest = form.parse()?;
    let avatar = form.into_files().into_iter().next();

    let new_avatar_key = match &avatar {
        Some(file) => Some(state.blobs.put(file, USER_AVATARS_FOLDER).await?),
        None => None,
    };

    let changes = UserChanges {
        name: Some(input.name),
        avatar_key: new_avatar_key.clone().map(Some),
    };
    let updated = match state.repo.update_user(user.id, changes).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(key) = &new_avatar_key {
                log::error!("profile update for {} failed, orphaned avatar {}", user.id, key);
            }
            return Err(e.into());
        }
    };

    if let (Some(_), Some(old_key)) = (&new_avatar_key, &user.avatar_key) {
        if let Err(e) = state.blobs.delete(old_key).await {
            log::warn!("could not remove previous avatar {}: {}", old_key, e);
        }
    }

    Ok(HttpResponse::Ok().json(profile(&state, updated)))
}

/// Removes the caller's avatar. Succeeds when no avatar is set.
#[delete("/me/avatar")]
pub async fn delete_avatar(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = current_user(&state, &caller).await?;

    if let Some(key) = &user.avatar_key {
        state.blobs.delete(key).await?;
        state
            .repo
            .update_user(
                user.id,
                UserChanges {
                    name: None,
                    avatar_key: Some(None),
                },
            )
            .await?;
        log::info!("removed avatar of user {}", user.id);
    }

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}
