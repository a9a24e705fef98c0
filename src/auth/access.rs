use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

/// Path segment naming the task on task-scoped routes.
pub const TASK_ID_PARAM: &str = "taskId";

/// A task the caller is allowed to touch.
///
/// Resolves the `{taskId}` path segment and checks it against the authenticated user
/// before the handler body runs. Handlers that take this extractor read their request
/// body afterwards, so a foreign task is rejected before any upload is parsed or stored.
#[derive(Debug, Clone)]
pub struct OwnedTask {
    pub task_id: Uuid,
    pub user: AuthenticatedUser,
}

fn task_not_found() -> AppError {
    AppError::NotFound("Invalid taskId: no task found with this taskId".into())
}

async fn authorize(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    raw_task_id: Option<String>,
) -> Result<OwnedTask, AppError> {
    let task_id = raw_task_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(task_not_found)?;

    match state.repo.task_owner(task_id).await? {
        None => Err(task_not_found()),
        Some(owner) if owner != user.id => {
            log::info!("user {} denied access to task {}", user.id, task_id);
            Err(AppError::Forbidden(
                "User does not have access to this resource".into(),
            ))
        }
        Some(_) => Ok(OwnedTask { task_id, user }),
    }
}

impl FromRequest for OwnedTask {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = AuthenticatedUser::from_http_request(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let raw_task_id = req.match_info().get(TASK_ID_PARAM).map(str::to_string);

        Box::pin(async move {
            let user = user?;
            let state = state.ok_or_else(|| {
                AppError::Internal("AppState is not registered with the application".into())
            })?;
            authorize(state, user, raw_task_id)
                .await
                .map_err(ActixError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordHasher, TokenService};
    use crate::blob::MemoryBlobStore;
    use crate::models::{NewTask, NewUser};
    use crate::store::{MemoryRepository, Repository};
    use std::sync::Arc;

    async fn state_with_task() -> (web::Data<AppState>, Uuid, Uuid) {
        let repo = Arc::new(MemoryRepository::new());
        let owner = repo
            .create_user(NewUser {
                email: "owner@example.com".into(),
                name: "Owner".into(),
                password_hash: "x".into(),
                avatar_key: None,
            })
            .await
            .unwrap();
        let task = repo
            .create_task(NewTask {
                title: "Mine".into(),
                description: None,
                user_id: owner.id,
            })
            .await
            .unwrap();
        let state = AppState::new(
            repo,
            Arc::new(MemoryBlobStore::new()),
            TokenService::new("secret", chrono::Duration::hours(1)),
            PasswordHasher::new(4),
        );
        (web::Data::new(state), owner.id, task.id)
    }

    fn caller(id: Uuid) -> AuthenticatedUser {
        AuthenticatedUser {
            id,
            email: "caller@example.com".into(),
        }
    }

    #[actix_rt::test]
    async fn test_owner_is_admitted() {
        let (state, owner, task) = state_with_task().await;
        let owned = authorize(state, caller(owner), Some(task.to_string()))
            .await
            .unwrap();
        assert_eq!(owned.task_id, task);
        assert_eq!(owned.user.id, owner);
    }

    #[actix_rt::test]
    async fn test_other_user_is_forbidden() {
        let (state, _, task) = state_with_task().await;
        let err = authorize(state, caller(Uuid::new_v4()), Some(task.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_rt::test]
    async fn test_unknown_or_malformed_task_is_not_found() {
        let (state, owner, _) = state_with_task().await;
        let err = authorize(state.clone(), caller(owner), Some(Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = authorize(state, caller(owner), Some("not-a-uuid".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
