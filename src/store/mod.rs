//! Persistence seam.
//!
//! Handlers only talk to [`Repository`]. Every method returns a discriminated
//! [`StoreError`] so driver-specific failures (unique violations, missing rows) are
//! classified once, inside the adapter.

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Attachment, NewTask, NewUser, Task, TaskChanges, User, UserChanges};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed row does not exist. Carries the entity name.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Connection, query or driver failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Repository: Send + Sync {
    // -- users --

    /// Inserts a user. A duplicate email is `StoreError::Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError>;

    // -- tasks --

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Owner of the task, or `None` if the task does not exist.
    async fn task_owner(&self, id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Tasks owned by `user_id`, newest first.
    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// One page of all tasks ordered by creation time then id, plus the total count.
    async fn list_tasks_page(&self, offset: i64, limit: i64) -> Result<(Vec<Task>, i64), StoreError>;

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Task, StoreError>;

    /// Deletes the task and, by cascade, its attachment rows.
    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError>;

    // -- attachments --

    async fn list_attachments(&self, task_id: Uuid) -> Result<Vec<Attachment>, StoreError>;

    /// Attachments of several tasks in one round trip.
    async fn list_attachments_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Attachment>, StoreError>;

    /// Attachment `id` if it belongs to `task_id`.
    async fn find_attachment(&self, task_id: Uuid, id: Uuid) -> Result<Option<Attachment>, StoreError>;

    async fn create_attachments(&self, task_id: Uuid, keys: &[String]) -> Result<Vec<Attachment>, StoreError>;

    /// Deletes the given attachment rows. Ids that no longer exist are skipped.
    async fn delete_attachments(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
}
