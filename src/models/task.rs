use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::attachment::AttachmentResponse;

/// Task row as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub done: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a task. New tasks always start with `done = false`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub user_id: Uuid,
}

/// Scalar field changes. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub done: Option<bool>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.done.is_none()
    }
}

/// Payload for `POST /api/tasks`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 2, message = "Title must be at least 2 characters long"))]
    pub title: String,
    pub description: Option<String>,
}

/// Payload for `PATCH /api/tasks/{taskId}`; every field is optional.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchTaskRequest {
    #[validate(length(min = 2, message = "Title must be at least 2 characters long"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub done: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub existing_file_ids: Option<Vec<String>>,
}

/// Payload for `PUT /api/tasks/{taskId}`; same as PATCH except the title is required.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PutTaskRequest {
    #[validate(length(min = 2, message = "Title must be at least 2 characters long"))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub done: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub existing_file_ids: Option<Vec<String>>,
}

impl From<PutTaskRequest> for PatchTaskRequest {
    fn from(put: PutTaskRequest) -> Self {
        Self {
            title: Some(put.title),
            description: put.description,
            done: put.done,
            existing_file_ids: put.existing_file_ids,
        }
    }
}

impl PatchTaskRequest {
    pub fn changes(&self) -> TaskChanges {
        TaskChanges {
            title: self.title.clone(),
            description: self.description.clone(),
            done: self.done,
        }
    }
}

/// `done` arrives as a JSON boolean or, from multipart forms, as `"true"` / `"false"`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(value)) => Ok(Some(value)),
        Some(Flag::Text(text)) => match text.trim() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected true or false, got {:?}",
                other
            ))),
        },
    }
}

/// The keep list arrives as a JSON array, a single id, or a string holding a
/// JSON-encoded array (what some form clients send for array fields).
fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ids {
        Many(Vec<String>),
        One(String),
    }

    Ok(match Option::<Ids>::deserialize(deserializer)? {
        None => None,
        Some(Ids::Many(ids)) => Some(ids),
        Some(Ids::One(raw)) => {
            let trimmed = raw.trim();
            if trimmed.starts_with('[') {
                let ids: Vec<String> =
                    serde_json::from_str(trimmed).map_err(serde::de::Error::custom)?;
                Some(ids)
            } else if trimmed.is_empty() {
                Some(Vec::new())
            } else {
                Some(vec![raw])
            }
        }
    })
}

/// Task as returned by the API, attachments resolved to URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub done: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub files: Vec<AttachmentResponse>,
}

impl TaskResponse {
    pub fn new(task: Task, files: Vec<AttachmentResponse>) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            done: task.done,
            user_id: task.user_id,
            created_at: task.created_at,
            updated_at: task.updated_at,
            files,
        }
    }
}

/// Query for the administrative listing: `?page=&tasksPerPage=` (`pageSize` also accepted).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[validate(range(min = 1, message = "page must be at least 1"))]
    #[serde(default = "default_page")]
    pub page: i64,
    #[validate(range(min = 1, max = 100, message = "tasksPerPage must be between 1 and 100"))]
    #[serde(default = "default_page_size", alias = "pageSize")]
    pub tasks_per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

impl PageQuery {
    /// Rows to skip. Saturates, so a page far past the end is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.tasks_per_page)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            tasks_per_page: default_page_size(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    pub tasks: Vec<TaskResponse>,
    pub task_total_count: i64,
}
