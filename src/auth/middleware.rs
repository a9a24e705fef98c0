use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::ACCESS_TOKEN_HEADER;
use crate::error::AppError;
use crate::state::AppState;

/// First step of the request pipeline for protected routes: verifies the
/// `Access-Token` header and stores the [`Claims`](crate::auth::Claims) in the request
/// extensions for the extractors that follow.
///
/// Requests under `/api/auth/` and `/health` pass through untouched.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

fn is_public(path: &str) -> bool {
    path == "/health" || path.starts_with("/api/auth/")
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public(req.path()) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let Some(token) = token else {
            log::debug!("rejecting {} {}: missing token", req.method(), req.path());
            return Box::pin(async { Err(AppError::unauthorized().into()) });
        };

        let verified = match req.app_data::<web::Data<AppState>>() {
            Some(state) => state.tokens.verify(token).map_err(AppError::from),
            None => Err(AppError::Internal(
                "AppState is not registered with the application".into(),
            )),
        };

        match verified {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                Box::pin(self.service.call(req))
            }
            Err(app_err) => {
                log::debug!("rejecting {} {}: {}", req.method(), req.path(), app_err);
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public("/health"));
        assert!(is_public("/api/auth/login"));
        assert!(is_public("/api/auth/registration"));
        assert!(!is_public("/api/tasks"));
        assert!(!is_public("/api/users/me"));
        assert!(!is_public("/api/authx"));
    }
}
