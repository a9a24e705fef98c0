use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::AppError;

/// The caller identity taken from the verified token.
///
/// Only available on routes wrapped by `AuthMiddleware`, which puts the decoded
/// [`Claims`] into the request extensions. If they are missing the extractor answers
/// 401, so a route that was accidentally left unwrapped fails closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

impl AuthenticatedUser {
    pub fn from_http_request(req: &HttpRequest) -> Result<Self, AppError> {
        req.extensions()
            .get::<Claims>()
            .cloned()
            .map(AuthenticatedUser::from)
            .ok_or_else(AppError::unauthorized)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(AuthenticatedUser::from_http_request(req).map_err(ActixError::from))
    }
}
