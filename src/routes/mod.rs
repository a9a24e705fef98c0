pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

use crate::error::AppError;

/// Registers every `/api` route. `/tasks/all` is registered ahead of `/tasks/{taskId}`
/// so it is never read as a task id.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login),
    )
    .service(
        web::scope("/users")
            .service(users::get_profile)
            .service(users::update_profile)
            .service(users::delete_avatar),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::get_tasks)
            .service(tasks::create_task)
            .service(tasks::get_all_tasks)
            .service(tasks::get_task)
            .service(tasks::put_task)
            .service(tasks::patch_task)
            .service(tasks::delete_task)
            .service(tasks::delete_attachment),
    );
}
