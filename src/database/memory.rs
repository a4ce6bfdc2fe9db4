//! In-process metadata store for development and tests.
//!
//! All state sits behind one mutex, so `adjust_storage_used` is atomic with
//! respect to every other call.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    database::store::{MetadataStore, QuotaUpdate},
    errors::{AppError, Result},
    models::{FileRecord, NewFileRecord, NewUser, User},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    files: HashMap<Uuid, FileRecord>,
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    tables: Mutex<Tables>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Validation("User already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            storage_limit: user.storage_limit,
            storage_used: 0,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.lock();
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn adjust_storage_used(&self, user_id: Uuid, delta: i64) -> Result<QuotaUpdate> {
        let mut tables = self.tables.lock();
        let user = tables.users.get_mut(&user_id).ok_or(AppError::UserNotFound)?;

        let new_used = user.storage_used.saturating_add(delta).max(0);
        if delta > 0 && new_used > user.storage_limit {
            return Ok(QuotaUpdate::Rejected {
                storage_used: user.storage_used,
                storage_limit: user.storage_limit,
            });
        }

        user.storage_used = new_used;
        user.updated_at = Utc::now();

        Ok(QuotaUpdate::Applied { storage_used: new_used })
    }

    async fn set_storage_used(&self, user_id: Uuid, storage_used: i64) -> Result<()> {
        let mut tables = self.tables.lock();
        let user = tables.users.get_mut(&user_id).ok_or(AppError::UserNotFound)?;
        user.storage_used = storage_used;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn file_exists_by_name(&self, user_id: Uuid, file_name: &str) -> Result<bool> {
        let tables = self.tables.lock();
        Ok(tables
            .files
            .values()
            .any(|f| f.user_id == user_id && f.file_name == file_name))
    }

    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        let mut tables = self.tables.lock();
        if tables
            .files
            .values()
            .any(|f| f.user_id == file.user_id && f.file_name == file.file_name)
        {
            return Err(AppError::DuplicateFile);
        }

        let now = Utc::now();
        let record = FileRecord {
            id: Uuid::new_v4(),
            user_id: file.user_id,
            file_name: file.file_name,
            file_path: file.file_path,
            size: file.size,
            created_at: now,
            updated_at: now,
        };
        tables.files.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_file(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<FileRecord>> {
        let tables = self.tables.lock();
        Ok(tables
            .files
            .get(&file_id)
            .filter(|f| f.user_id == user_id)
            .cloned())
    }

    async fn list_files(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FileRecord>> {
        let tables = self.tables.lock();
        let mut files: Vec<FileRecord> = tables
            .files
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(files
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_files(&self, user_id: Uuid) -> Result<i64> {
        let tables = self.tables.lock();
        Ok(tables.files.values().filter(|f| f.user_id == user_id).count() as i64)
    }

    async fn sum_file_sizes(&self, user_id: Uuid) -> Result<i64> {
        let tables = self.tables.lock();
        Ok(tables
            .files
            .values()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.size)
            .sum())
    }

    async fn delete_file(&self, file_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock();
        match tables.files.get(&file_id) {
            Some(f) if f.user_id == user_id => {
                tables.files.remove(&file_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
