//! Store wrapper that injects failures into selected calls.

use async_trait::async_trait;
use std::{
    sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};
use uuid::Uuid;

use crate::{
    database::{MemoryMetadataStore, MetadataStore, QuotaUpdate},
    errors::{AppError, Result},
    models::{FileRecord, NewFileRecord, NewUser, User},
};

#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryMetadataStore,
    /// Number of upcoming `adjust_storage_used` calls that fail.
    pub adjust_failures: AtomicU32,
    pub fail_create_file: AtomicBool,
    /// Milliseconds each `create_file` call sleeps first.
    pub create_file_delay_ms: AtomicU64,
}

impl FaultyStore {
    pub fn fail_next_adjustments(&self, count: u32) {
        self.adjust_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_file_inserts(&self, fail: bool) {
        self.fail_create_file.store(fail, Ordering::SeqCst);
    }

    pub fn delay_file_inserts(&self, delay: Duration) {
        self.create_file_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for FaultyStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.inner.create_user(user).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn adjust_storage_used(&self, user_id: Uuid, delta: i64) -> Result<QuotaUpdate> {
        let pending = self
            .adjust_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(AppError::Metadata("connection reset".to_string()));
        }
        self.inner.adjust_storage_used(user_id, delta).await
    }

    async fn set_storage_used(&self, user_id: Uuid, storage_used: i64) -> Result<()> {
        self.inner.set_storage_used(user_id, storage_used).await
    }

    async fn file_exists_by_name(&self, user_id: Uuid, file_name: &str) -> Result<bool> {
        self.inner.file_exists_by_name(user_id, file_name).await
    }

    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        let delay = self.create_file_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_create_file.load(Ordering::SeqCst) {
            return Err(AppError::Metadata("insert failed".to_string()));
        }
        self.inner.create_file(file).await
    }

    async fn find_file(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<FileRecord>> {
        self.inner.find_file(file_id, user_id).await
    }

    async fn list_files(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FileRecord>> {
        self.inner.list_files(user_id, limit, offset).await
    }

    async fn count_files(&self, user_id: Uuid) -> Result<i64> {
        self.inner.count_files(user_id).await
    }

    async fn sum_file_sizes(&self, user_id: Uuid) -> Result<i64> {
        self.inner.sum_file_sizes(user_id).await
    }

    async fn delete_file(&self, file_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.inner.delete_file(file_id, user_id).await
    }
}
