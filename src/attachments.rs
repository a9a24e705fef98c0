//! Task attachment bookkeeping: uploads, keep-list reconciliation, and
//! URL resolution for responses.
//!
//! Each blob write or delete happens before the matching record write. When a later
//! step fails, the blobs already touched are logged and left in place.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::blob::{UploadedFile, TASK_IMAGES_FOLDER};
use crate::error::AppError;
use crate::models::{Attachment, AttachmentResponse, Task, TaskResponse};
use crate::state::AppState;

/// Trims an id from the keep list, strips one pair of matching `"` or `'`
/// quotes, then trims again.
pub fn normalize_file_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|quote| {
            trimmed
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// Attachments that are not in the keep list. No keep list means nothing is removed.
pub fn attachments_to_delete<'a>(
    current: &'a [Attachment],
    keep: Option<&[String]>,
) -> Vec<&'a Attachment> {
    let Some(keep) = keep else {
        return Vec::new();
    };
    let keep: HashSet<String> = keep.iter().map(|id| normalize_file_id(id)).collect();
    current
        .iter()
        .filter(|attachment| !keep.contains(&attachment.id.to_string()))
        .collect()
}

/// Uploads `files` under `task-images` and records one attachment per key.
pub async fn attach_uploads(
    state: &AppState,
    task_id: Uuid,
    files: &[UploadedFile],
) -> Result<Vec<Attachment>, AppError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let keys = state.blobs.put_many(files, TASK_IMAGES_FOLDER).await?;
    match state.repo.create_attachments(task_id, &keys).await {
        Ok(attachments) => {
            log::debug!("attached {} files to task {}", attachments.len(), task_id);
            Ok(attachments)
        }
        Err(e) => {
            log::error!(
                "recording attachments for task {} failed, orphaned blobs left behind: {:?}",
                task_id,
                keys
            );
            Err(e.into())
        }
    }
}

/// Applies a keep list and new uploads to the attachments of `task_id`.
///
/// Attachments missing from `keep` lose their blob first and their record second; a
/// failed blob delete stops before any record is touched. New files are uploaded
/// after removals.
pub async fn reconcile(
    state: &AppState,
    task_id: Uuid,
    keep: Option<&[String]>,
    files: &[UploadedFile],
) -> Result<(), AppError> {
    let current = state.repo.list_attachments(task_id).await?;
    let removed = attachments_to_delete(&current, keep);

    if !removed.is_empty() {
        let keys: Vec<String> = removed.iter().map(|a| a.key.clone()).collect();
        let ids: Vec<Uuid> = removed.iter().map(|a| a.id).collect();

        state.blobs.delete_many(&keys).await?;
        let deleted = state.repo.delete_attachments(&ids).await?;
        log::info!("removed {} attachments from task {}", deleted, task_id);
    }

    attach_uploads(state, task_id, files).await?;
    Ok(())
}

/// Deletes every attachment blob of the task, then the task row (records cascade).
pub async fn purge_task(state: &AppState, task_id: Uuid) -> Result<(), AppError> {
    let current = state.repo.list_attachments(task_id).await?;
    let keys: Vec<String> = current.into_iter().map(|a| a.key).collect();

    if !keys.is_empty() {
        state.blobs.delete_many(&keys).await?;
    }
    state.repo.delete_task(task_id).await?;
    log::info!("deleted task {} with {} attachments", task_id, keys.len());
    Ok(())
}

/// Removes one attachment of `task_id`: blob first, then the record.
pub async fn remove_attachment(
    state: &AppState,
    task_id: Uuid,
    attachment_id: Uuid,
) -> Result<(), AppError> {
    let attachment = state
        .repo
        .find_attachment(task_id, attachment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    state.blobs.delete(&attachment.key).await?;
    state.repo.delete_attachments(&[attachment.id]).await?;
    Ok(())
}

fn resolve(state: &AppState, attachment: Attachment) -> AttachmentResponse {
    AttachmentResponse {
        url: state.blobs.resolve_url(&attachment.key),
        id: attachment.id,
        key: attachment.key,
    }
}

/// Loads the attachments of one task and builds its response.
pub async fn task_response(state: &AppState, task: Task) -> Result<TaskResponse, AppError> {
    let files = state
        .repo
        .list_attachments(task.id)
        .await?
        .into_iter()
        .map(|attachment| resolve(state, attachment))
        .collect();
    Ok(TaskResponse::new(task, files))
}

/// Builds responses for many tasks with a single attachment query.
pub async fn task_responses(
    state: &AppState,
    tasks: Vec<Task>,
) -> Result<Vec<TaskResponse>, AppError> {
    let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
    let mut by_task: HashMap<Uuid, Vec<AttachmentResponse>> = HashMap::new();
    if !ids.is_empty() {
        for attachment in state.repo.list_attachments_for_tasks(&ids).await? {
            by_task
                .entry(attachment.task_id)
                .or_default()
                .push(resolve(state, attachment));
        }
    }

    Ok(tasks
        .into_iter()
        .map(|task| {
            let files = by_task.remove(&task.id).unwrap_or_default();
            TaskResponse::new(task, files)
        })
        .collect())
}
