use async_trait::async_trait;
use std::{future::Future, time::Duration};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    models::{FileRecord, NewFileRecord, NewUser, User},
};

/// Outcome of a conditional usage update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaUpdate {
    Applied { storage_used: i64 },
    /// The increment would have crossed the limit; nothing was written.
    Rejected { storage_used: i64, storage_limit: i64 },
}

/// Persistence for user accounting and file records.
///
/// `adjust_storage_used` must perform the limit check and the write as one
/// step, so two reservations for the same user can never both succeed past
/// the limit.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Add `delta` to `storage_used`, clamping at zero. Positive deltas that
    /// would exceed `storage_limit` are rejected. Fails with `UserNotFound`.
    async fn adjust_storage_used(&self, user_id: Uuid, delta: i64) -> Result<QuotaUpdate>;

    async fn set_storage_used(&self, user_id: Uuid, storage_used: i64) -> Result<()>;

    async fn file_exists_by_name(&self, user_id: Uuid, file_name: &str) -> Result<bool>;

    /// Fails with `DuplicateFile` if the owner already has a record with that name.
    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord>;

    async fn find_file(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<FileRecord>>;

    /// Newest first.
    async fn list_files(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FileRecord>>;

    async fn count_files(&self, user_id: Uuid) -> Result<i64>;

    async fn sum_file_sizes(&self, user_id: Uuid) -> Result<i64>;

    /// Returns whether a record matched.
    async fn delete_file(&self, file_id: Uuid, user_id: Uuid) -> Result<bool>;
}

/// Run a store call under `limit`; an elapsed timer is a store error.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::StoreTimeout(limit)),
    }
}
