use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{Repository, StoreError};
use crate::models::{Attachment, NewTask, NewUser, Task, TaskChanges, User, UserChanges};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
    attachments: HashMap<Uuid, Attachment>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing timestamps keep creation order stable within a test run.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }
}

/// In-memory [`Repository`] with the same constraints as the Postgres schema:
/// unique emails and cascading task deletes.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachment_count(&self) -> usize {
        self.lock().attachments.len()
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sorted_by_creation(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    tasks
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        let now = state.next_timestamp();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            avatar_key: user.avatar_key,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut state = self.lock();
        let now = state.next_timestamp();
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("User"))?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(avatar_key) = changes.avatar_key {
            user.avatar_key = avatar_key;
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let mut state = self.lock();
        if !state.users.contains_key(&task.user_id) {
            return Err(StoreError::NotFound("User"));
        }
        let now = state.next_timestamp();
        let task = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            done: false,
            user_id: task.user_id,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    async fn task_owner(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.lock().tasks.get(&id).map(|task| task.user_id))
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let owned: Vec<Task> = self
            .lock()
            .tasks
            .values()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect();
        let mut tasks = sorted_by_creation(owned);
        tasks.reverse();
        Ok(tasks)
    }

    async fn list_tasks_page(&self, offset: i64, limit: i64) -> Result<(Vec<Task>, i64), StoreError> {
        let all = sorted_by_creation(self.lock().tasks.values().cloned().collect());
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Task, StoreError> {
        let mut state = self.lock();
        let now = state.next_timestamp();
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound("Task"))?;
        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = Some(description);
        }
        if let Some(done) = changes.done {
            task.done = done;
        }
        task.updated_at = now;
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.tasks.remove(&id).ok_or(StoreError::NotFound("Task"))?;
        state.attachments.retain(|_, attachment| attachment.task_id != id);
        Ok(())
    }

    async fn list_attachments(&self, task_id: Uuid) -> Result<Vec<Attachment>, StoreError> {
        self.list_attachments_for_tasks(&[task_id]).await
    }

    async fn list_attachments_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Attachment>, StoreError> {
        let mut attachments: Vec<Attachment> = self
            .lock()
            .attachments
            .values()
            .filter(|attachment| task_ids.contains(&attachment.task_id))
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(attachments)
    }

    async fn find_attachment(&self, task_id: Uuid, id: Uuid) -> Result<Option<Attachment>, StoreError> {
        Ok(self
            .lock()
            .attachments
            .get(&id)
            .filter(|attachment| attachment.task_id == task_id)
            .cloned())
    }

    async fn create_attachments(&self, task_id: Uuid, keys: &[String]) -> Result<Vec<Attachment>, StoreError> {
        let mut state = self.lock();
        if !state.tasks.contains_key(&task_id) {
            return Err(StoreError::NotFound("Task"));
        }
        let mut created = Vec::with_capacity(keys.len());
        for key in keys {
            let attachment = Attachment {
                id: Uuid::new_v4(),
                key: key.clone(),
                task_id,
                created_at: state.next_timestamp(),
            };
            state.attachments.insert(attachment.id, attachment.clone());
            created.push(attachment);
        }
        Ok(created)
    }

    async fn delete_attachments(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let removed = ids
            .iter()
            .filter(|id| state.attachments.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Tester".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            avatar_key: None,
        }
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = MemoryRepository::new();
        repo.create_user(new_user("dup@example.com")).await.unwrap();
        let err = repo.create_user(new_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_task_delete_cascades_attachments() {
        let repo = MemoryRepository::new();
        let user = repo.create_user(new_user("a@example.com")).await.unwrap();
        let task = repo
            .create_task(NewTask {
                title: "Cascade".into(),
                description: None,
                user_id: user.id,
            })
            .await
            .unwrap();
        repo.create_attachments(task.id, &["k1".into(), "k2".into()])
            .await
            .unwrap();
        assert_eq!(repo.attachment_count(), 2);

        repo.delete_task(task.id).await.unwrap();
        assert_eq!(repo.attachment_count(), 0);
        assert_eq!(repo.task_owner(task.id).await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn test_find_attachment_is_scoped_to_task() {
        let repo = MemoryRepository::new();
        let user = repo.create_user(new_user("b@example.com")).await.unwrap();
        let mut tasks = Vec::new();
        for title in ["one", "two"] {
            tasks.push(
                repo.create_task(NewTask {
                    title: title.into(),
                    description: None,
                    user_id: user.id,
                })
                .await
                .unwrap(),
            );
        }
        let created = repo.create_attachments(tasks[0].id, &["k".into()]).await.unwrap();

        assert!(repo.find_attachment(tasks[0].id, created[0].id).await.unwrap().is_some());
        assert!(repo.find_attachment(tasks[1].id, created[0].id).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_update_task_keeps_omitted_fields() {
        let repo = MemoryRepository::new();
        let user = repo.create_user(new_user("c@example.com")).await.unwrap();
        let task = repo
            .create_task(NewTask {
                title: "Original".into(),
                description: Some("desc".into()),
                user_id: user.id,
            })
            .await
            .unwrap();

        let updated = repo
            .update_task(
                task.id,
                TaskChanges {
                    done: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Original");
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert!(updated.done);
    }
}
