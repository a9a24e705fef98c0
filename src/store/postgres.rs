use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Repository, StoreError};
use crate::models::{Attachment, NewTask, NewUser, Task, TaskChanges, User, UserChanges};

const USER_COLUMNS: &str = "id, email, name, password_hash, avatar_key, created_at, updated_at";
const TASK_COLUMNS: &str = "id, title, description, done, user_id, created_at, updated_at";
const ATTACHMENT_COLUMNS: &str = "id, key, task_id, created_at";

/// [`Repository`] on PostgreSQL. Schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Classifies driver errors so callers never inspect raw `sqlx` errors.
fn classify(error: sqlx::Error, entity: &'static str) -> StoreError {
    match error {
        sqlx::Error::RowNotFound => StoreError::NotFound(entity),
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            StoreError::Conflict(db_error.message().to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, name, password_hash, avatar_key)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.avatar_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "User"))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "User"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "User"))
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        // $3 says whether the avatar column is being written at all, so that a
        // NULL in $4 can mean "clear the avatar".
        let (set_avatar, avatar_key) = match changes.avatar_key {
            Some(avatar_key) => (true, avatar_key),
            None => (false, None),
        };

        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 avatar_key = CASE WHEN $3 THEN $4 ELSE avatar_key END,
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(set_avatar)
        .bind(avatar_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "User"))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, title, description, done, user_id)
             VALUES ($1, $2, $3, FALSE, $4)
             RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Task"))
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        sqlx::query_as::<_, Task>(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "Task"))
    }

    async fn task_owner(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "Task"))
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            TASK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "Task"))
    }

    async fn list_tasks_page(&self, offset: i64, limit: i64) -> Result<(Vec<Task>, i64), StoreError> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks ORDER BY created_at ASC, id ASC OFFSET $1 LIMIT $2",
            TASK_COLUMNS
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "Task"))?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "Task"))?;

        Ok((tasks, total))
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Task, StoreError> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 done = COALESCE($4, done),
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.done)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Task"))
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "Task"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Task"));
        }
        Ok(())
    }

    async fn list_attachments(&self, task_id: Uuid) -> Result<Vec<Attachment>, StoreError> {
        sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {} FROM task_files WHERE task_id = $1 ORDER BY created_at, id",
            ATTACHMENT_COLUMNS
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "Attachment"))
    }

    async fn list_attachments_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Attachment>, StoreError> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {} FROM task_files WHERE task_id = ANY($1) ORDER BY created_at, id",
            ATTACHMENT_COLUMNS
        ))
        .bind(task_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "Attachment"))
    }

    async fn find_attachment(&self, task_id: Uuid, id: Uuid) -> Result<Option<Attachment>, StoreError> {
        sqlx::query_as::<_, Attachment>(&format!(
            "SELECT {} FROM task_files WHERE id = $1 AND task_id = $2",
            ATTACHMENT_COLUMNS
        ))
        .bind(id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "Attachment"))
    }

    async fn create_attachments(&self, task_id: Uuid, keys: &[String]) -> Result<Vec<Attachment>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = keys.iter().map(|_| Uuid::new_v4()).collect();

        // One statement, so either every record lands or none does.
        sqlx::query_as::<_, Attachment>(&format!(
            "INSERT INTO task_files (id, key, task_id)
             SELECT id, key, $3 FROM UNNEST($1::uuid[], $2::text[]) AS input(id, key)
             RETURNING {}",
            ATTACHMENT_COLUMNS
        ))
        .bind(&ids)
        .bind(keys)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, "Attachment"))
    }

    async fn delete_attachments(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM task_files WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, "Attachment"))?;
        Ok(result.rows_affected())
    }
}
