use actix_web::{post, web, HttpRequest, HttpResponse, Responder};

use crate::{
    auth::AuthResponse,
    blob::USER_AVATARS_FOLDER,
    error::AppError,
    form::{RequestForm, AVATAR, NO_FILES},
    models::{LoginRequest, NewUser, RegisterRequest},
    state::AppState,
    store::StoreError,
};

const EMAIL_TAKEN: &str = "A user with this email is already registered";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registers a new user.
///
/// Accepts `application/json` or `multipart/form-data` with the text fields `email`,
/// `name` and `password`, plus an optional image under `avatar`. The password is
/// hashed with bcrypt before storage; the avatar, if any, is stored under
/// `user-avatars/`.
///
/// ## Responses:
/// - `201 Created`: `{ "token": "..." }`, a session token for the new user.
/// - `400 Bad Request`: Validation failed or the avatar is not an accepted image.
/// - `409 Conflict`: The email is already registered. The just-uploaded avatar is removed.
/// - `500 Internal Server Error`: Hashing, database or blob store failure.
#[post("/registration")]
pub async fn register(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<impl Responder, AppError> {
    let form = RequestForm::read(&req, payload, AVATAR).await?;
    let input: RegisterRequest = form.parse()?;
    let avatar = form.into_files().into_iter().next();

    let passwords = state.passwords;
    let password = input.password;
    let password_hash = web::block(move || passwords.hash(&password)).await??;

    let avatar_key = match &avatar {
        Some(file) => Some(state.blobs.put(file, USER_AVATARS_FOLDER).await?),
        None => None,
    };

    let created = state
        .repo
        .create_user(NewUser {
            email: input.email,
            name: input.name,
            password_hash,
            avatar_key: avatar_key.clone(),
        })
        .await;

    let user = match created {
        Ok(user) => user,
        Err(e) => {
            if let Some(key) = &avatar_key {
                if let Err(cleanup) = state.blobs.delete(key).await {
                    log::warn!("could not remove avatar {} after failed registration: {}", key, cleanup);
                }
            }
            return Err(match e {
                StoreError::Conflict(_) => AppError::Conflict(EMAIL_TAKEN.into()),
                other => other.into(),
            });
        }
    };

    let token = state.tokens.issue(user.id, &user.email)?;
    log::info!("registered user {}", user.id);

    Ok(HttpResponse::Created().json(AuthResponse { token }))
}

/// Authenticates a user and returns a session token.
///
/// ## Responses:
/// - `200 OK`: `{ "token": "..." }`.
/// - `400 Bad Request`: The body is malformed or fails validation.
/// - `401 Unauthorized`: Unknown email or wrong password; both give the same body.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<impl Responder, AppError> {
    let form = RequestForm::read(&req, payload, NO_FILES).await?;
    let input: LoginRequest = form.parse()?;

    let invalid_credentials = || AppError::Unauthorized {
        message: INVALID_CREDENTIALS.into(),
        details: None,
        expired_at: None,
    };

    let user = state
        .repo
        .find_user_by_email(&input.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let passwords = state.passwords;
    let stored_hash = user.password_hash.clone();
    let password = input.password;
    let valid = web::block(move || passwords.verify(&password, &stored_hash)).await??;
    if !valid {
        log::debug!("failed login for user {}", user.id);
        return Err(invalid_credentials());
    }

    let token = state.tokens.issue(user.id, &user.email)?;
    Ok(HttpResponse::Ok().json(AuthResponse { token }))
}
