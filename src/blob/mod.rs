//! Key-addressed image storage.
//!
//! [`BlobStore`] is the seam between handlers and the object store. Production runs
//! on [`S3BlobStore`]; [`MemoryBlobStore`] backs the test suite.

mod memory;
mod s3_store;

pub use memory::MemoryBlobStore;
pub use s3_store::S3BlobStore;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;

/// Folder for task attachments.
pub const TASK_IMAGES_FOLDER: &str = "task-images";
/// Folder for profile avatars.
pub const USER_AVATARS_FOLDER: &str = "user-avatars";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// An uploaded file that passed the ingress filter.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `data` under `key`.
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), BlobError>;

    /// Removes `key`. Removing a key that does not exist is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Maps a key to a fetchable URL. Pure and deterministic.
    fn resolve_url(&self, key: &str) -> String;

    /// Stores `file` under `folder` and returns its generated key.
    async fn put(&self, file: &UploadedFile, folder: &str) -> Result<String, BlobError> {
        let key = object_key(folder, &file.file_name);
        self.put_object(&key, file.data.clone(), &file.content_type)
            .await?;
        log::debug!("stored blob {} ({} bytes)", key, file.data.len());
        Ok(key)
    }

    /// Stores every file concurrently. Fails if any single upload fails; uploads that
    /// already completed stay in the store and are logged as orphans.
    async fn put_many(&self, files: &[UploadedFile], folder: &str) -> Result<Vec<String>, BlobError> {
        let results = join_all(files.iter().map(|file| self.put(file, folder))).await;

        let mut keys = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(key) => keys.push(key),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(keys),
            Some(e) => {
                if !keys.is_empty() {
                    log::error!("batch upload failed, orphaned blobs left behind: {:?}", keys);
                }
                Err(BlobError::Unavailable(format!(
                    "failed to upload one or more files: {}",
                    e
                )))
            }
        }
    }

    /// Deletes every key concurrently, then fails as a whole if any delete failed.
    async fn delete_many(&self, keys: &[String]) -> Result<(), BlobError> {
        let results = join_all(keys.iter().map(|key| self.delete(key))).await;

        let failed: Vec<&str> = keys
            .iter()
            .zip(results.iter())
            .filter(|(_, result)| result.is_err())
            .map(|(key, _)| key.as_str())
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(BlobError::Unavailable(format!(
                "failed to delete {} of {} blobs: {:?}",
                failed.len(),
                keys.len(),
                failed
            )))
        }
    }
}

static KEY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Builds `folder/<token>-<name>` where the token is unix millis plus a process-wide
/// sequence number, and whitespace in the name becomes `_`.
pub fn object_key(folder: &str, original_name: &str) -> String {
    let sequence = KEY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}/{}{:06}-{}",
        folder,
        Utc::now().timestamp_millis(),
        sequence % 1_000_000,
        sanitize_file_name(original_name)
    )
}

pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
