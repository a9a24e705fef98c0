use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{EMAIL_REGEX, HAS_LETTER_REGEX};

/// A stored user. Deliberately not `Serialize`: the password hash must never reach a
/// response body, so handlers map into [`UserProfile`] instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub avatar_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub avatar_key: Option<String>,
}

/// Field changes for a profile update. `avatar_key: Some(None)` clears the avatar.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub avatar_key: Option<Option<String>>,
}

/// Registration payload (multipart text fields or JSON).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        email(message = "Invalid email address"),
        regex(path = "EMAIL_REGEX", message = "Invalid email address")
    )]
    pub email: String,
    #[validate(length(min = 2, message = "Name must be at least 2 characters long"))]
    pub name: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters long"),
        regex(path = "HAS_LETTER_REGEX", message = "Password must contain a letter")
    )]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        email(message = "Invalid email address"),
        regex(path = "EMAIL_REGEX", message = "Invalid email address")
    )]
    pub email: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters long"),
        regex(path = "HAS_LETTER_REGEX", message = "Password must contain a letter")
    )]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters long"))]
    pub name: String,
}

/// Public view of a user: `{email, name, avatar}` with the avatar resolved to a URL.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}
