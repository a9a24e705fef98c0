use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    attachments,
    auth::{AuthenticatedUser, OwnedTask},
    error::AppError,
    form::{RequestForm, TASK_FILES},
    models::{CreateTaskRequest, NewTask, PageQuery, PatchTaskRequest, PutTaskRequest, TaskPage},
    state::AppState,
};

fn task_gone(task_id: Uuid) -> AppError {
    AppError::NotFound(format!("Task {} not found", task_id))
}

/// Retrieves the authenticated user's tasks, newest first, with their files.
///
/// ## Responses:
/// - `200 OK`: A JSON array of tasks.
/// - `401 Unauthorized`: If the request lacks a valid `Access-Token`.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let tasks = state.repo.list_tasks_for_user(caller.id).await?;
    let tasks = attachments::task_responses(&state, tasks).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Lists every task, one page at a time. Not scoped to the caller.
///
/// ## Query Parameters:
/// - `page` (optional, default 1): 1-based page number.
/// - `tasksPerPage` (optional, default 10, max 100): page size. `pageSize` is accepted too.
///
/// ## Responses:
/// - `200 OK`: `{ "tasks": [...], "taskTotalCount": n }`, ordered by creation time then id.
/// - `400 Bad Request`: `page` or `tasksPerPage` out of range.
#[get("/all")]
pub async fn get_all_tasks(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, AppError> {
    let query = query.into_inner();
    query.validate()?;

    let (tasks, total) = state
        .repo
        .list_tasks_page(query.offset(), query.tasks_per_page)
        .await?;
    let tasks = attachments::task_responses(&state, tasks).await?;

    Ok(HttpResponse::Ok().json(TaskPage {
        tasks,
        task_total_count: total,
    }))
}

/// Creates a task owned by the caller.
///
/// ## Request Body:
/// JSON or `multipart/form-data` with `title` (required, at least 2 characters) and
/// `description` (optional). Multipart requests may carry up to 12 images under
/// `files` / `files[]`.
///
/// ## Responses:
/// - `201 Created`: The new task including its files.
/// - `400 Bad Request`: Validation failed or an upload was rejected.
/// - `401 Unauthorized`: If the request lacks a valid `Access-Token`.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<impl Responder, AppError> {
    let form = RequestForm::read(&req, payload, TASK_FILES).await?;
    let input: CreateTaskRequest = form.parse()?;
    let files = form.into_files();

    let task = state
        .repo
        .create_task(NewTask {
            title: input.title,
            description: input.description,
            user_id: caller.id,
        })
        .await?;
    if let Err(e) = attachments::attach_uploads(&state, task.id, &files).await {
        // A task whose uploads failed is removed so the client can simply retry.
        if let Err(cleanup) = state.repo.delete_task(task.id).await {
            log::warn!(
                "removing task {} after failed uploads also failed: {}",
                task.id,
                cleanup
            );
        }
        return Err(e);
    }
    log::info!("user {} created task {}", caller.id, task.id);

    let response = attachments::task_response(&state, task).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Retrieves one task. Only its owner may read it.
///
/// ## Responses:
/// - `200 OK`: The task including its files.
/// - `403 Forbidden`: The task belongs to another user.
/// - `404 Not Found`: No task with this id.
#[get("/{taskId}")]
pub async fn get_task(
    state: web::Data<AppState>,
    owned: OwnedTask,
) -> Result<impl Responder, AppError> {
    let task = state
        .repo
        .find_task(owned.task_id)
        .await?
        .ok_or_else(|| task_gone(owned.task_id))?;
    let response = attachments::task_response(&state, task).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn apply_update(
    state: &AppState,
    owned: &OwnedTask,
    input: PatchTaskRequest,
    files: Vec<crate::blob::UploadedFile>,
) -> Result<HttpResponse, AppError> {
    attachments::reconcile(
        state,
        owned.task_id,
        input.existing_file_ids.as_deref(),
        &files,
    )
    .await?;

    let changes = input.changes();
    let task = if changes.is_empty() {
        state
            .repo
            .find_task(owned.task_id)
            .await?
            .ok_or_else(|| task_gone(owned.task_id))?
    } else {
        state.repo.update_task(owned.task_id, changes).await?
    };
    log::info!("user {} updated task {}", owned.user.id, owned.task_id);

    let response = attachments::task_response(state, task).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Replaces a task's fields and reconciles its files.
///
/// ## Request Body:
/// JSON or `multipart/form-data` with `title` (required), `description`, `done`
/// (boolean or `"true"`/`"false"`), `existingFileIds` and new images under `files`.
/// Files whose ids are missing from `existingFileIds` are deleted; omitting the field
/// keeps every file.
///
/// ## Responses:
/// - `200 OK`: The updated task.
/// - `400 Bad Request`: Validation failed or an upload was rejected.
/// - `403 Forbidden` / `404 Not Found`: As for `get_task`. Checked before the body is read.
#[put("/{taskId}")]
pub async fn put_task(
    state: web::Data<AppState>,
    owned: OwnedTask,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, AppError> {
    let form = RequestForm::read(&req, payload, TASK_FILES).await?;
    let input: PutTaskRequest = form.parse()?;
    apply_update(&state, &owned, input.into(), form.into_files()).await
}

/// Same as [`put_task`] except every field is optional.
#[patch("/{taskId}")]
pub async fn patch_task(
    state: web::Data<AppState>,
    owned: OwnedTask,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, AppError> {
    let form = RequestForm::read(&req, payload, TASK_FILES).await?;
    let input: PatchTaskRequest = form.parse()?;
    apply_update(&state, &owned, input, form.into_files()).await
}

/// Deletes a task, its file blobs and its file records.
///
/// ## Responses:
/// - `200 OK`: `{ "deleted": true }`.
/// - `403 Forbidden` / `404 Not Found`: As for `get_task`.
#[delete("/{taskId}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    owned: OwnedTask,
) -> Result<impl Responder, AppError> {
    attachments::purge_task(&state, owned.task_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

/// Deletes one file of a task. The file must belong to the task in the path.
#[delete("/{taskId}/attachments/{fileId}")]
pub async fn delete_attachment(
    state: web::Data<AppState>,
    owned: OwnedTask,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, AppError> {
    let (_, raw_file_id) = path.into_inner();
    let file_id = Uuid::parse_str(&raw_file_id)
        .map_err(|_| AppError::NotFound("File not found".into()))?;

    attachments::remove_attachment(&state, owned.task_id, file_id).await?;
    log::info!("user {} removed file {} from task {}", owned.user.id, file_id, owned.task_id);
    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}
